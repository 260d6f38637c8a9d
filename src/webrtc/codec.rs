//! Video codec capabilities and encoder/decoder factories
//!
//! The engine only negotiates codecs; the factories here describe which
//! codecs the local side can encode/decode and how an encoder for a given
//! codec is laid out (single layer or simulcast layers).

use std::collections::BTreeMap;
use std::sync::Arc;

use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::RTCPFeedback;

/// Video RTP clock rate
pub const VIDEO_CLOCK_RATE: u32 = 90000;

/// Simulcast layer RIDs, lowest resolution first
pub const SIMULCAST_RIDS: [&str; 3] = ["r0", "r1", "r2"];

const H264_CONSTRAINED_HIGH: &str = "640c1f";
const H264_CONSTRAINED_BASELINE: &str = "42e01f";

/// Codec capability: name plus fmtp parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

impl CodecInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn h264(profile_level_id: &str) -> Self {
        Self::new("H264")
            .with_parameter("level-asymmetry-allowed", "1")
            .with_parameter("packetization-mode", "1")
            .with_parameter("profile-level-id", profile_level_id)
    }

    pub fn vp9(profile_id: u8) -> Self {
        Self::new("VP9").with_parameter("profile-id", profile_id.to_string())
    }

    pub fn mime_type(&self) -> String {
        format!("video/{}", self.name)
    }

    /// fmtp line in parameter-key order
    pub fn sdp_fmtp_line(&self) -> String {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Whether both entries describe the same encodable format
    ///
    /// Names compare case-insensitively; H264 also has to agree on profile
    /// and packetization mode, VP9 on profile.
    pub fn is_same_codec(&self, other: &CodecInfo) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name) {
            return false;
        }
        fn param(info: &CodecInfo, key: &str, default: &str) -> String {
            info.parameters
                .get(key)
                .map(|v| v.to_ascii_lowercase())
                .unwrap_or_else(|| default.to_string())
        }
        if self.name.eq_ignore_ascii_case("H264") {
            fn profile(info: &CodecInfo) -> String {
                let id = param(info, "profile-level-id", H264_CONSTRAINED_BASELINE);
                id.get(..4).map(str::to_string).unwrap_or(id)
            }
            return profile(self) == profile(other)
                && param(self, "packetization-mode", "0") == param(other, "packetization-mode", "0");
        }
        if self.name.eq_ignore_ascii_case("VP9") {
            return param(self, "profile-id", "0") == param(other, "profile-id", "0");
        }
        true
    }

    /// RTP capability registered with the media engine
    pub fn to_rtp_capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type(),
            clock_rate: VIDEO_CLOCK_RATE,
            channels: 0,
            sdp_fmtp_line: self.sdp_fmtp_line(),
            rtcp_feedback: video_rtcp_feedback(),
        }
    }
}

impl std::fmt::Display for CodecInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.name, self.parameters)
    }
}

/// RTCP feedback advertised for every video codec
pub fn video_rtcp_feedback() -> Vec<RTCPFeedback> {
    vec![
        RTCPFeedback {
            typ: "goog-remb".to_owned(),
            parameter: "".to_owned(),
        },
        RTCPFeedback {
            typ: "ccm".to_owned(),
            parameter: "fir".to_owned(),
        },
        RTCPFeedback {
            typ: "nack".to_owned(),
            parameter: "".to_owned(),
        },
        RTCPFeedback {
            typ: "nack".to_owned(),
            parameter: "pli".to_owned(),
        },
    ]
}

/// One encoding produced by an encoder
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingLayer {
    /// RTP stream id; `None` for a plain single-layer encoding
    pub rid: Option<String>,
    /// Downscale factor relative to the capture resolution
    pub scale_resolution_down_by: f64,
}

/// Encoder instantiated by a factory for a concrete codec
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoder {
    pub codec: CodecInfo,
    /// Name of the factory that produced it
    pub implementation: String,
    pub layers: Vec<EncodingLayer>,
}

impl VideoEncoder {
    pub fn is_simulcast(&self) -> bool {
        self.layers.len() > 1
    }
}

/// Instantiates video encoders for the codecs it supports
pub trait VideoEncoderFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Supported codecs in preference order
    fn supported_codecs(&self) -> Vec<CodecInfo>;

    /// Returns `None` when the codec is not supported
    fn create_encoder(&self, codec: &CodecInfo) -> Option<VideoEncoder>;
}

/// Instantiates video decoders; only the capability list matters to the engine
pub trait VideoDecoderFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_codecs(&self) -> Vec<CodecInfo>;
}

/// Single-layer encoder factory: H264 (high, baseline), VP8, VP9, AV1
#[derive(Debug, Default)]
pub struct DefaultVideoEncoderFactory;

impl DefaultVideoEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl VideoEncoderFactory for DefaultVideoEncoderFactory {
    fn name(&self) -> &'static str {
        "default"
    }

    fn supported_codecs(&self) -> Vec<CodecInfo> {
        vec![
            CodecInfo::h264(H264_CONSTRAINED_HIGH),
            CodecInfo::h264(H264_CONSTRAINED_BASELINE),
            CodecInfo::new("VP8"),
            CodecInfo::vp9(0),
            CodecInfo::new("AV1"),
        ]
    }

    fn create_encoder(&self, codec: &CodecInfo) -> Option<VideoEncoder> {
        let supported = self
            .supported_codecs()
            .into_iter()
            .find(|info| info.is_same_codec(codec))?;

        Some(VideoEncoder {
            codec: supported,
            implementation: self.name().to_string(),
            layers: vec![EncodingLayer {
                rid: None,
                scale_resolution_down_by: 1.0,
            }],
        })
    }
}

/// Simulcast encoder factory wrapping a primary and a fallback factory
///
/// Encoders come from the primary when it supports the codec, otherwise
/// from the fallback, and are split into the `r0`/`r1`/`r2` layers.
pub struct SimulcastVideoEncoderFactory {
    primary: Arc<dyn VideoEncoderFactory>,
    fallback: Arc<dyn VideoEncoderFactory>,
}

impl SimulcastVideoEncoderFactory {
    pub fn new(primary: Arc<dyn VideoEncoderFactory>, fallback: Arc<dyn VideoEncoderFactory>) -> Self {
        Self { primary, fallback }
    }
}

impl VideoEncoderFactory for SimulcastVideoEncoderFactory {
    fn name(&self) -> &'static str {
        "simulcast"
    }

    fn supported_codecs(&self) -> Vec<CodecInfo> {
        let mut codecs = self.primary.supported_codecs();
        for codec in self.fallback.supported_codecs() {
            if !codecs.contains(&codec) {
                codecs.push(codec);
            }
        }
        codecs
    }

    fn create_encoder(&self, codec: &CodecInfo) -> Option<VideoEncoder> {
        let base = self
            .primary
            .create_encoder(codec)
            .or_else(|| self.fallback.create_encoder(codec))?;

        let layer_count = SIMULCAST_RIDS.len();
        let layers = SIMULCAST_RIDS
            .iter()
            .enumerate()
            .map(|(i, rid)| EncodingLayer {
                rid: Some((*rid).to_string()),
                scale_resolution_down_by: f64::from(1u32 << (layer_count - 1 - i)),
            })
            .collect();

        Some(VideoEncoder {
            codec: base.codec,
            implementation: format!("{}({})", self.name(), base.implementation),
            layers,
        })
    }
}

/// Decoder factory used by every engine context
#[derive(Debug, Default)]
pub struct DefaultVideoDecoderFactory;

impl DefaultVideoDecoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl VideoDecoderFactory for DefaultVideoDecoderFactory {
    fn name(&self) -> &'static str {
        "default"
    }

    fn supported_codecs(&self) -> Vec<CodecInfo> {
        vec![
            CodecInfo::h264(H264_CONSTRAINED_HIGH),
            CodecInfo::h264(H264_CONSTRAINED_BASELINE),
            CodecInfo::new("VP8"),
            CodecInfo::vp9(0),
            CodecInfo::vp9(2),
            CodecInfo::new("AV1"),
        ]
    }
}
