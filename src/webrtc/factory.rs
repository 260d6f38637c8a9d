//! Peer connection factory
//!
//! Builds peer connections, media streams, sources and tracks on top of a
//! single [`EngineContext`]. The factory is built once and reused for every
//! connection attempt.

use std::sync::Arc;

use tracing::{debug, info};

use super::certificate::CertificateVerifier;
use super::codec::{CodecInfo, DefaultVideoDecoderFactory, VideoDecoderFactory};
use super::config::WebRtcConfiguration;
use super::encoder_selector::EncoderFactorySelector;
use super::engine::EngineContext;
use super::events::PeerConnectionObserver;
use super::peer::PeerConnection;
use super::track::{
    AudioSlot, AudioSource, AudioTrack, MediaStream, VideoSlot, VideoSource, VideoTrack,
};
use super::{LOG_NATIVE_PEER_CHANNEL, LOG_PEER_CHANNEL};
use crate::config::{Configuration, MediaConstraints};
use crate::error::{FactoryError, Result};

/// Factory for peer connections and local media
pub struct PeerConnectionFactory {
    engine: Arc<EngineContext>,
    /// Preferred video codec name; `None` takes the encoder factory's first codec
    preferred_video_codec: Option<String>,
}

impl PeerConnectionFactory {
    /// Build the factory from the selector's current mode and the default
    /// decoder factory
    pub fn new(encoder_selector: Arc<EncoderFactorySelector>) -> Self {
        Self::with_decoder_factory(encoder_selector, Arc::new(DefaultVideoDecoderFactory::new()))
    }

    pub fn with_decoder_factory(
        encoder_selector: Arc<EncoderFactorySelector>,
        decoder_factory: Arc<dyn VideoDecoderFactory>,
    ) -> Self {
        Self {
            engine: Arc::new(EngineContext::new(encoder_selector, decoder_factory)),
            preferred_video_codec: None,
        }
    }

    /// Apply the configuration's simulcast mode to `encoder_selector`, then
    /// build the factory with the configured video codec preference
    pub fn from_configuration(
        encoder_selector: Arc<EncoderFactorySelector>,
        config: &Configuration,
    ) -> Self {
        encoder_selector.set_simulcast(config.simulcast_enabled);
        let mut factory = Self::new(encoder_selector);
        factory.preferred_video_codec = config.video_codec.codec_name().map(str::to_string);
        factory
    }

    pub fn with_preferred_video_codec(mut self, name: impl Into<String>) -> Self {
        self.preferred_video_codec = Some(name.into());
        self
    }

    pub fn engine(&self) -> &Arc<EngineContext> {
        &self.engine
    }

    pub fn encoder_selector(&self) -> &Arc<EncoderFactorySelector> {
        self.engine.encoder_selector()
    }

    /// Create a peer connection
    ///
    /// Every ICE server endpoint must parse; a bad endpoint or an engine
    /// refusal is reported as [`FactoryError::PeerConnectionCreation`].
    pub async fn create_peer_connection(
        &self,
        config: &WebRtcConfiguration,
        constraints: MediaConstraints,
        verifier: Arc<dyn CertificateVerifier>,
        observer: Option<Arc<dyn PeerConnectionObserver>>,
    ) -> Result<PeerConnection> {
        config
            .validate()
            .map_err(|e| FactoryError::PeerConnectionCreation(e.to_string()))?;

        let peer = PeerConnection::new(
            self.engine.api(),
            config.to_rtc_configuration(),
            constraints,
            verifier,
            observer,
        )
        .await?;

        info!(
            target: LOG_PEER_CHANNEL,
            "peer connection {} created ({} ICE servers)",
            peer.connection_id(),
            config.ice_servers.len()
        );
        Ok(peer)
    }

    /// Create an empty local media stream
    pub fn create_stream(&self, stream_id: &str) -> MediaStream {
        MediaStream::new(stream_id.to_string(), None, None)
    }

    pub fn create_video_source(&self) -> VideoSource {
        VideoSource::new()
    }

    pub fn create_audio_source(&self, constraints: MediaConstraints) -> AudioSource {
        AudioSource::new(constraints)
    }

    /// Create a video track encoded by the encoder factory active right now
    pub fn create_video_track(&self, source: VideoSource, track_id: &str) -> VideoTrack {
        let codec = self.video_track_codec();
        let encoder = self.encoder_selector().create_encoder(&codec);
        debug!(
            target: LOG_NATIVE_PEER_CHANNEL,
            "create native video track ({}) codec={} encoder={}",
            track_id,
            codec,
            encoder
                .as_ref()
                .map(|e| e.implementation.as_str())
                .unwrap_or("none")
        );
        VideoTrack::new(track_id.to_string(), source, codec, encoder)
    }

    /// Create an audio track bound to a fresh audio source
    pub fn create_audio_track(&self, track_id: &str, constraints: MediaConstraints) -> AudioTrack {
        debug!(target: LOG_NATIVE_PEER_CHANNEL, "create native audio track ({})", track_id);
        AudioTrack::new(track_id.to_string(), self.create_audio_source(constraints))
    }

    /// Compose a local stream; a track is built for each present slot only
    pub fn create_sender_stream(
        &self,
        stream_id: &str,
        video: VideoSlot,
        audio: AudioSlot,
        constraints: MediaConstraints,
    ) -> MediaStream {
        debug!(target: LOG_NATIVE_PEER_CHANNEL, "create native sender stream ({})", stream_id);

        let video_track = match video {
            VideoSlot::Absent => None,
            VideoSlot::Video(track_id) => {
                Some(self.create_video_track(self.create_video_source(), &track_id))
            }
        };
        let audio_track = match audio {
            AudioSlot::Absent => None,
            AudioSlot::Audio(track_id) => Some(self.create_audio_track(&track_id, constraints)),
        };
        MediaStream::new(stream_id.to_string(), video_track, audio_track)
    }

    /// Sender stream for a publishing client, using the configured ids
    ///
    /// Video is included when the role sends and video is enabled, audio
    /// likewise.
    pub fn create_publisher_stream(
        &self,
        config: &Configuration,
        constraints: MediaConstraints,
    ) -> MediaStream {
        let sending = config.is_sender();
        let video = if sending && config.video_enabled {
            VideoSlot::video(config.publisher_video_track_id.as_str())
        } else {
            VideoSlot::Absent
        };
        let audio = if sending && config.audio_enabled {
            AudioSlot::audio(config.publisher_audio_track_id.as_str())
        } else {
            AudioSlot::Absent
        };
        self.create_sender_stream(&config.publisher_stream_id, video, audio, constraints)
    }

    /// Preferred codec if the active encoder factory supports it, otherwise
    /// the factory's first codec
    fn video_track_codec(&self) -> CodecInfo {
        let supported = self.encoder_selector().supported_codecs();
        let preferred = self.preferred_video_codec.as_deref().and_then(|name| {
            supported
                .iter()
                .find(|codec| codec.name.eq_ignore_ascii_case(name))
        });
        preferred
            .or_else(|| supported.first())
            .cloned()
            .unwrap_or_else(|| CodecInfo::new("VP8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;
    use crate::webrtc::certificate::SystemCertificateVerifier;
    use crate::webrtc::config::IceServer;
    use crate::webrtc::track::LocalTrack;
    use rustls::RootCertStore;

    fn factory(simulcast: bool) -> PeerConnectionFactory {
        PeerConnectionFactory::new(Arc::new(EncoderFactorySelector::new(simulcast)))
    }

    fn verifier() -> Arc<dyn CertificateVerifier> {
        Arc::new(SystemCertificateVerifier::with_roots(RootCertStore::empty()))
    }

    #[test]
    fn test_sender_stream_slot_combinations() {
        let factory = factory(false);
        let cases = [
            (VideoSlot::Absent, AudioSlot::Absent, 0),
            (VideoSlot::video("v"), AudioSlot::Absent, 1),
            (VideoSlot::Absent, AudioSlot::audio("a"), 1),
            (VideoSlot::video("v"), AudioSlot::audio("a"), 2),
        ];

        for (video, audio, expected) in cases {
            let has_video = video.is_present();
            let has_audio = audio.is_present();
            let stream = factory.create_sender_stream("s", video, audio, MediaConstraints::new());

            assert_eq!(stream.stream_id(), "s");
            assert_eq!(stream.track_count(), expected);
            assert_eq!(stream.video_track().map(|t| t.track_id()), has_video.then_some("v"));
            assert_eq!(stream.audio_track().map(|t| t.track_id()), has_audio.then_some("a"));
        }
    }

    #[test]
    fn test_offer_stream_ids() {
        let stream = factory(false).create_sender_stream(
            "offer",
            VideoSlot::video("video"),
            AudioSlot::audio("audio"),
            MediaConstraints::new(),
        );
        assert_eq!(stream.stream_id(), "offer");
        assert_eq!(stream.video_track().unwrap().track_id(), "video");
        assert_eq!(stream.audio_track().unwrap().track_id(), "audio");
    }

    #[test]
    fn test_video_track_uses_current_encoder_factory() {
        let factory = factory(false);
        let track = factory.create_video_track(factory.create_video_source(), "v");
        assert_eq!(track.encoder().unwrap().layers.len(), 1);

        factory.encoder_selector().set_simulcast(true);
        let track = factory.create_video_track(factory.create_video_source(), "v");
        let encoder = track.encoder().unwrap();
        assert!(encoder.is_simulcast());
        assert_eq!(encoder.layers.len(), 3);
    }

    #[test]
    fn test_preferred_video_codec() {
        let vp9 = factory(false).with_preferred_video_codec("vp9");
        let track = vp9.create_video_track(vp9.create_video_source(), "v");
        assert_eq!(track.codec().name, "VP9");

        let unknown = factory(false).with_preferred_video_codec("H265");
        let track = unknown.create_video_track(unknown.create_video_source(), "v");
        assert_eq!(track.codec(), &unknown.encoder_selector().supported_codecs()[0]);
    }

    #[test]
    fn test_audio_track_gets_fresh_source() {
        let factory = factory(false);
        let constraints = MediaConstraints::new().with_mandatory("echoCancellation", "false");
        let a = factory.create_audio_track("a", constraints.clone());
        let b = factory.create_audio_track("b", constraints.clone());
        assert_ne!(a.source().source_id(), b.source().source_id());
        assert_eq!(a.source().constraints(), &constraints);
    }

    #[test]
    fn test_publisher_stream_follows_role() {
        let factory = factory(false);
        let mut config = Configuration::new(
            vec!["wss://sora.example.com/signaling".to_string()],
            "channel",
            Role::Sendonly,
            false,
        );
        config.audio_enabled = false;

        let stream = factory.create_publisher_stream(&config, MediaConstraints::new());
        assert_eq!(stream.stream_id(), "mainStream");
        assert_eq!(stream.video_track().unwrap().track_id(), "mainVideo");
        assert!(stream.audio_track().is_none());

        config.role = Role::Recvonly;
        config.audio_enabled = true;
        let stream = factory.create_publisher_stream(&config, MediaConstraints::new());
        assert_eq!(stream.track_count(), 0);
    }

    #[test]
    fn test_from_configuration_applies_simulcast() {
        let selector = Arc::new(EncoderFactorySelector::new(false));
        let mut config = Configuration::default();
        config.simulcast_enabled = true;
        config.video_codec = crate::config::VideoCodec::VP8;

        let factory = PeerConnectionFactory::from_configuration(selector.clone(), &config);
        assert!(selector.simulcast_enabled());
        let track = factory.create_video_track(factory.create_video_source(), "v");
        assert_eq!(track.codec().name, "VP8");
    }

    #[tokio::test]
    async fn test_invalid_ice_endpoint_fails_creation() {
        let mut config = WebRtcConfiguration::host_only();
        config.ice_servers.push(IceServer::stun("bogus://nowhere"));

        let result = factory(false)
            .create_peer_connection(&config, MediaConstraints::new(), verifier(), None)
            .await;
        assert!(matches!(result, Err(FactoryError::PeerConnectionCreation(_))));
    }

    #[tokio::test]
    async fn test_create_peer_connection() {
        let peer = factory(false)
            .create_peer_connection(
                &WebRtcConfiguration::host_only(),
                MediaConstraints::new().with_optional("DtlsSrtpKeyAgreement", "true"),
                verifier(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(peer.constraints().get("DtlsSrtpKeyAgreement"), Some("true"));
        assert!(!peer.is_closed());
        peer.close().await.unwrap();
    }
}
