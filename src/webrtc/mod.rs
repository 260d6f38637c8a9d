//! Native peer connection factory
//!
//! This module turns a configuration snapshot into live WebRTC objects:
//! - Encoder factory selection (single codec / simulcast)
//! - Transport certificate verification
//! - Peer connections, media streams, sources and tracks
//! - Offer probing for local capability introspection
//!
//! Architecture:
//! ```text
//! Configuration ──> EncoderFactorySelector ──┐
//!                                            v
//!                  DecoderFactory ──> EngineContext (webrtc API)
//!                                            |
//!                                            v
//!                                  PeerConnectionFactory
//!                                   |        |         |
//!                                   v        v         v
//!                       PeerConnection  MediaStream  OfferProbe
//!                       (+ verifier)    (tracks)     (throwaway offer)
//! ```

pub mod certificate;
pub mod codec;
pub mod config;
pub mod encoder_selector;
pub mod engine;
pub mod events;
pub mod factory;
pub mod mdns;
pub mod offer_probe;
pub mod peer;
pub mod track;

/// Log target for factory, verifier and connection diagnostics
pub(crate) const LOG_PEER_CHANNEL: &str = "peer_channel";
/// Log target for local stream composition
pub(crate) const LOG_NATIVE_PEER_CHANNEL: &str = "native_peer_channel";

pub use certificate::{CertificateVerification, CertificateVerifier, SystemCertificateVerifier};
pub use codec::{
    CodecInfo, DefaultVideoDecoderFactory, DefaultVideoEncoderFactory, SimulcastVideoEncoderFactory,
    VideoDecoderFactory, VideoEncoder, VideoEncoderFactory,
};
pub use config::{IceServer, WebRtcConfiguration};
pub use encoder_selector::EncoderFactorySelector;
pub use engine::EngineContext;
pub use events::{ConnectionState, IceCandidate, PeerConnectionObserver};
pub use factory::PeerConnectionFactory;
pub use offer_probe::{create_client_offer_sdp, spawn_offer_probe, OfferProbeHandle};
pub use peer::PeerConnection;
pub use track::{
    AudioSlot, AudioSource, AudioTrack, LocalTrack, MediaStream, TrackKind, VideoSlot, VideoSource,
    VideoTrack,
};
