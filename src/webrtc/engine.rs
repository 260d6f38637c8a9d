//! Engine context: the webrtc API instance shared by every connection

use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use tracing::{debug, error, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::interceptor::registry::Registry;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTCRtpHeaderExtensionCapability, RTPCodecType,
};

use super::codec::{CodecInfo, VideoDecoderFactory};
use super::encoder_selector::EncoderFactorySelector;
use super::mdns::{mdns_mode, mdns_mode_label};
use super::LOG_PEER_CHANNEL;

/// First dynamic RTP payload type handed to video codecs
const FIRST_VIDEO_PAYLOAD_TYPE: u8 = 96;
/// Opus payload type
const OPUS_PAYLOAD_TYPE: u8 = 111;

/// RTP header extensions needed to send RID-based simulcast
const SIMULCAST_HEADER_EXTENSIONS: [&str; 3] = [
    "urn:ietf:params:rtp-hdrext:sdes:mid",
    "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id",
    "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id",
];

/// Create RTP codec capability for audio (Opus)
pub fn audio_codec_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: "audio/opus".to_string(),
        clock_rate: 48000,
        channels: 2,
        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
        rtcp_feedback: vec![],
    }
}

/// Shared engine state, built once and read-only afterwards
pub struct EngineContext {
    api: API,
    encoder_selector: Arc<EncoderFactorySelector>,
    decoder_factory: Arc<dyn VideoDecoderFactory>,
    video_codecs: Vec<CodecInfo>,
}

impl EngineContext {
    /// Build the engine from the selector's current encoder factory and the
    /// decoder factory
    ///
    /// Registration problems are logged and skipped; construction itself
    /// never fails.
    pub fn new(
        encoder_selector: Arc<EncoderFactorySelector>,
        decoder_factory: Arc<dyn VideoDecoderFactory>,
    ) -> Self {
        debug!(target: LOG_PEER_CHANNEL, "create native peer channel factory");
        install_crypto_provider();

        let simulcast = encoder_selector.simulcast_enabled();
        let video_codecs = negotiable_codecs(
            &encoder_selector.supported_codecs(),
            &decoder_factory.supported_codecs(),
        );

        let mut media_engine = MediaEngine::default();
        register_codecs(&mut media_engine, &video_codecs);
        if simulcast {
            register_simulcast_extensions(&mut media_engine);
        }

        let registry = match register_default_interceptors(Registry::new(), &mut media_engine) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(target: LOG_PEER_CHANNEL, "failed to register interceptors: {}", e);
                Registry::new()
            }
        };

        let mut setting_engine = SettingEngine::default();
        let mode = mdns_mode();
        setting_engine.set_ice_multicast_dns_mode(mode);
        info!(target: LOG_PEER_CHANNEL, "WebRTC mDNS mode: {}", mdns_mode_label(mode));

        let api = APIBuilder::new()
            .with_setting_engine(setting_engine)
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        for info in encoder_selector.supported_codecs() {
            debug!(
                target: LOG_PEER_CHANNEL,
                "supported video encoder: {} {:?}", info.name, info.parameters
            );
        }
        for info in decoder_factory.supported_codecs() {
            debug!(
                target: LOG_PEER_CHANNEL,
                "supported video decoder: {} {:?}", info.name, info.parameters
            );
        }

        Self {
            api,
            encoder_selector,
            decoder_factory,
            video_codecs,
        }
    }

    pub fn api(&self) -> &API {
        &self.api
    }

    pub fn encoder_selector(&self) -> &Arc<EncoderFactorySelector> {
        &self.encoder_selector
    }

    pub fn decoder_factory(&self) -> &Arc<dyn VideoDecoderFactory> {
        &self.decoder_factory
    }

    /// Video codecs registered with the media engine, in payload-type order
    pub fn video_codecs(&self) -> &[CodecInfo] {
        &self.video_codecs
    }
}

/// DTLS needs a process-wide rustls provider; keep one already installed
fn install_crypto_provider() {
    if CryptoProvider::install_default(ring::default_provider()).is_ok() {
        debug!(target: LOG_PEER_CHANNEL, "installed ring crypto provider");
    }
}

/// Encoder codecs first (their order is the local preference), then any
/// decode-only codecs
fn negotiable_codecs(encoders: &[CodecInfo], decoders: &[CodecInfo]) -> Vec<CodecInfo> {
    let mut codecs: Vec<CodecInfo> = Vec::with_capacity(encoders.len() + decoders.len());
    for codec in encoders.iter().chain(decoders) {
        if !codecs.contains(codec) {
            codecs.push(codec.clone());
        }
    }
    codecs
}

fn register_codecs(media_engine: &mut MediaEngine, video_codecs: &[CodecInfo]) {
    for (payload_type, info) in (FIRST_VIDEO_PAYLOAD_TYPE..).zip(video_codecs) {
        let params = RTCRtpCodecParameters {
            capability: info.to_rtp_capability(),
            payload_type,
            ..Default::default()
        };
        if let Err(e) = media_engine.register_codec(params, RTPCodecType::Video) {
            error!(target: LOG_PEER_CHANNEL, "failed to register codec {}: {}", info, e);
        }
    }

    let opus = RTCRtpCodecParameters {
        capability: audio_codec_capability(),
        payload_type: OPUS_PAYLOAD_TYPE,
        ..Default::default()
    };
    if let Err(e) = media_engine.register_codec(opus, RTPCodecType::Audio) {
        error!(target: LOG_PEER_CHANNEL, "failed to register opus: {}", e);
    }
}

fn register_simulcast_extensions(media_engine: &mut MediaEngine) {
    for uri in SIMULCAST_HEADER_EXTENSIONS {
        let extension = RTCRtpHeaderExtensionCapability {
            uri: uri.to_owned(),
        };
        if let Err(e) = media_engine.register_header_extension(extension, RTPCodecType::Video, None) {
            error!(target: LOG_PEER_CHANNEL, "failed to register header extension {}: {}", uri, e);
        }
    }
}
