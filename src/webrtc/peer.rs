//! WebRTC peer connection wrapper

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustls::pki_types::CertificateDer;
use tracing::{debug, info, warn};
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::certificate::{CertificateVerification, CertificateVerifier};
use super::events::{ConnectionState, IceCandidate, PeerConnectionObserver};
use super::track::{LocalTrack, TrackKind};
use super::LOG_PEER_CHANNEL;
use crate::config::MediaConstraints;
use crate::error::{FactoryError, Result};

/// Track registered with the connection
struct RegisteredTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
}

/// Peer connection with a fixed certificate verifier and an optional observer
///
/// Closing is idempotent: the engine connection is closed exactly once and
/// no observer callback is delivered afterwards.
pub struct PeerConnection {
    connection_id: String,
    pc: Arc<RTCPeerConnection>,
    constraints: MediaConstraints,
    verifier: Arc<dyn CertificateVerifier>,
    closed: Arc<AtomicBool>,
    tracks: Mutex<Vec<RegisteredTrack>>,
}

impl PeerConnection {
    /// Create a new peer connection from the shared engine
    pub(crate) async fn new(
        api: &API,
        rtc_config: RTCConfiguration,
        constraints: MediaConstraints,
        verifier: Arc<dyn CertificateVerifier>,
        observer: Option<Arc<dyn PeerConnectionObserver>>,
    ) -> Result<Self> {
        let pc = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| FactoryError::PeerConnectionCreation(e.to_string()))?;

        let peer = Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            pc: Arc::new(pc),
            constraints,
            verifier,
            closed: Arc::new(AtomicBool::new(false)),
            tracks: Mutex::new(vec![]),
        };
        peer.setup_event_handlers(observer);

        debug!(target: LOG_PEER_CHANNEL, "peer connection {} created", peer.connection_id);
        Ok(peer)
    }

    /// Set up peer connection event handlers
    fn setup_event_handlers(&self, observer: Option<Arc<dyn PeerConnectionObserver>>) {
        let closed = self.closed.clone();
        let connection_id = self.connection_id.clone();
        let state_observer = observer.clone();

        // Connection state change handler
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let closed = closed.clone();
                let connection_id = connection_id.clone();
                let observer = state_observer.clone();

                Box::pin(async move {
                    if closed.load(Ordering::Acquire) {
                        return;
                    }
                    let Some(state) = ConnectionState::from_rtc(s) else {
                        return;
                    };
                    info!(target: LOG_PEER_CHANNEL, "Peer {} connection state: {}", connection_id, state);

                    if let Some(observer) = observer {
                        observer.on_connection_state_change(state);
                    }
                })
            }));

        // ICE candidate handler
        let closed = self.closed.clone();
        let candidate_observer = observer.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let closed = closed.clone();
                let observer = candidate_observer.clone();

                Box::pin(async move {
                    let (Some(c), Some(observer)) = (candidate, observer) else {
                        return;
                    };
                    if closed.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(candidate) = IceCandidate::from_rtc(&c) {
                        debug!(target: LOG_PEER_CHANNEL, "ICE candidate: {}", candidate.candidate);
                        observer.on_ice_candidate(candidate);
                    }
                })
            }));

        let closed = self.closed.clone();
        self.pc.on_negotiation_needed(Box::new(move || {
            let closed = closed.clone();
            let observer = observer.clone();

            Box::pin(async move {
                if closed.load(Ordering::Acquire) {
                    return;
                }
                if let Some(observer) = observer {
                    observer.on_negotiation_needed();
                }
            })
        }));
    }

    /// Register a track with the connection under the owning stream id
    pub async fn add_track(&self, track: &dyn LocalTrack, stream_ids: &[String]) -> Result<()> {
        if self.is_closed() {
            return Err(FactoryError::WebRtc(format!(
                "peer connection {} is closed",
                self.connection_id
            )));
        }
        let stream_id = stream_ids.first().ok_or_else(|| {
            FactoryError::WebRtc(format!("track {} needs a stream id", track.track_id()))
        })?;
        if stream_ids.len() > 1 {
            warn!(
                target: LOG_PEER_CHANNEL,
                "track {} registered with first of {} stream ids",
                track.track_id(),
                stream_ids.len()
            );
        }

        let rtp_track = Arc::new(TrackLocalStaticSample::new(
            track.rtp_capability(),
            track.track_id().to_string(),
            stream_id.clone(),
        ));

        self.pc
            .add_track(rtp_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| {
                FactoryError::WebRtc(format!("Failed to add {} track: {}", track.kind(), e))
            })?;

        self.tracks.lock().push(RegisteredTrack {
            kind: track.kind(),
            track: rtp_track,
        });
        info!(
            target: LOG_PEER_CHANNEL,
            "{} track {} added to peer connection (stream {})",
            track.kind(),
            track.track_id(),
            stream_id
        );
        Ok(())
    }

    /// RTP track registered under `track_id`, for the media pipeline to write into
    pub fn local_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.tracks
            .lock()
            .iter()
            .find(|t| t.track.id() == track_id)
            .map(|t| t.track.clone())
    }

    pub fn local_track_count(&self) -> usize {
        self.tracks.lock().len()
    }

    fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks.lock().iter().any(|t| t.kind == kind)
    }

    /// Generate a local offer
    ///
    /// `OfferToReceiveAudio` / `OfferToReceiveVideo` add a receive-only
    /// transceiver for kinds without a local track.
    pub async fn create_offer(&self, constraints: &MediaConstraints) -> Result<String> {
        for (kind, wanted) in [
            (TrackKind::Audio, constraints.offer_to_receive_audio()),
            (TrackKind::Video, constraints.offer_to_receive_video()),
        ] {
            if wanted && !self.has_track(kind) {
                self.pc
                    .add_transceiver_from_kind(
                        kind.codec_type(),
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Recvonly,
                            send_encodings: vec![],
                        }),
                    )
                    .await
                    .map_err(|e| FactoryError::OfferGeneration(e.to_string()))?;
            }
        }

        let offer = self
            .pc
            .create_offer(Some(constraints.offer_options()))
            .await
            .map_err(|e| FactoryError::OfferGeneration(e.to_string()))?;
        Ok(offer.sdp)
    }

    /// Current connection state; `Closed` once closed through this wrapper
    pub fn connection_state(&self) -> ConnectionState {
        if self.is_closed() {
            return ConnectionState::Closed;
        }
        ConnectionState::from_rtc(self.pc.connection_state()).unwrap_or(ConnectionState::New)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the connection; later calls are no-ops
    pub async fn close(&self) -> Result<()> {
        close_once(&self.pc, &self.closed, &self.connection_id).await
    }

    /// Evaluate a TLS chain presented to one of this connection's transports
    ///
    /// Covers CA-issued chains such as a TURNS relay or secure signaling
    /// endpoint. The DTLS peer certificate is self-signed and authenticated
    /// by the SDP fingerprint, so it never goes through here.
    pub fn verify_transport_certificate(&self, chain: &[CertificateDer<'_>]) -> CertificateVerification {
        let verification = self.verifier.verify(chain);
        if let Some(reason) = verification.reason() {
            warn!(
                target: LOG_PEER_CHANNEL,
                "Peer {} transport certificate rejected: {}", self.connection_id, reason
            );
        }
        verification
    }

    /// Constraints the connection was created with
    pub fn constraints(&self) -> &MediaConstraints {
        &self.constraints
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Underlying engine connection, for the signaling layer
    pub fn native(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

async fn close_once(pc: &RTCPeerConnection, closed: &AtomicBool, connection_id: &str) -> Result<()> {
    if closed.swap(true, Ordering::AcqRel) {
        return Ok(());
    }
    debug!(target: LOG_PEER_CHANNEL, "closing peer connection {}", connection_id);
    pc.close()
        .await
        .map_err(|e| FactoryError::WebRtc(format!("Failed to close peer connection: {}", e)))
}
