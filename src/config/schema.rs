use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, Result};
use crate::webrtc::config::WebRtcConfiguration;

const DEFAULT_PUBLISHER_STREAM_ID: &str = "mainStream";
const DEFAULT_PUBLISHER_VIDEO_TRACK_ID: &str = "mainVideo";
const DEFAULT_PUBLISHER_AUDIO_TRACK_ID: &str = "mainAudio";

/// Client role on the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sendonly,
    Recvonly,
    Sendrecv,
    /// Legacy alias of `Sendonly`
    Publisher,
    /// Legacy alias of `Recvonly`
    Subscriber,
    /// Legacy multistream publisher
    Group,
    /// Legacy multistream subscriber
    #[serde(rename = "groupsub")]
    GroupSub,
}

impl Role {
    /// Whether this role sends local media
    pub fn is_sender(&self) -> bool {
        matches!(
            self,
            Role::Publisher | Role::Group | Role::Sendonly | Role::Sendrecv
        )
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Sendrecv
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Sendonly => "sendonly",
            Role::Recvonly => "recvonly",
            Role::Sendrecv => "sendrecv",
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
            Role::Group => "group",
            Role::GroupSub => "groupsub",
        };
        f.write_str(name)
    }
}

/// Video codec preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Let the active encoder factory decide
    Default,
    VP8,
    VP9,
    H264,
    AV1,
}

impl VideoCodec {
    /// Codec name as reported by the encoder factories
    pub fn codec_name(&self) -> Option<&'static str> {
        match self {
            VideoCodec::Default => None,
            VideoCodec::VP8 => Some("VP8"),
            VideoCodec::VP9 => Some("VP9"),
            VideoCodec::H264 => Some("H264"),
            VideoCodec::AV1 => Some("AV1"),
        }
    }
}

impl Default for VideoCodec {
    fn default() -> Self {
        Self::Default
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::Default => write!(f, "default"),
            VideoCodec::VP8 => write!(f, "VP8"),
            VideoCodec::VP9 => write!(f, "VP9"),
            VideoCodec::H264 => write!(f, "H.264"),
            VideoCodec::AV1 => write!(f, "AV1"),
        }
    }
}

/// Audio codec preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Default,
    Opus,
}

/// Simulcast layer requested when receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulcastRid {
    R0,
    R1,
    R2,
}

/// Client configuration snapshot handed to the factory by the orchestration layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Signaling URL candidates (ws:// or wss://)
    pub url_candidates: Vec<String>,
    /// Channel ID
    pub channel_id: String,
    /// Client ID
    pub client_id: Option<String>,
    /// Bundle ID
    pub bundle_id: Option<String>,
    /// Role on the channel
    pub role: Role,
    /// Multistream flag
    pub multistream_enabled: bool,
    /// Connection attempt timeout in seconds
    pub connection_timeout_secs: u64,
    /// Video codec preference
    pub video_codec: VideoCodec,
    /// Video bitrate in kbps
    pub video_bit_rate: Option<u32>,
    /// Audio codec preference
    pub audio_codec: AudioCodec,
    /// Audio bitrate in kbps
    pub audio_bit_rate: Option<u32>,
    /// Send/receive video
    pub video_enabled: bool,
    /// Send/receive audio
    pub audio_enabled: bool,
    /// Enable simulcast
    pub simulcast_enabled: bool,
    /// Requested simulcast layer (recvonly / sendrecv only)
    pub simulcast_rid: Option<SimulcastRid>,
    /// Transport-level settings
    pub webrtc: WebRtcConfiguration,
    /// Publisher stream ID
    pub publisher_stream_id: String,
    /// Publisher video track ID
    pub publisher_video_track_id: String,
    /// Publisher audio track ID
    pub publisher_audio_track_id: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            url_candidates: vec![],
            channel_id: String::new(),
            client_id: None,
            bundle_id: None,
            role: Role::default(),
            multistream_enabled: false,
            connection_timeout_secs: 30,
            video_codec: VideoCodec::default(),
            video_bit_rate: None,
            audio_codec: AudioCodec::default(),
            audio_bit_rate: None,
            video_enabled: true,
            audio_enabled: true,
            simulcast_enabled: false,
            simulcast_rid: None,
            webrtc: WebRtcConfiguration::default(),
            publisher_stream_id: DEFAULT_PUBLISHER_STREAM_ID.to_string(),
            publisher_video_track_id: DEFAULT_PUBLISHER_VIDEO_TRACK_ID.to_string(),
            publisher_audio_track_id: DEFAULT_PUBLISHER_AUDIO_TRACK_ID.to_string(),
        }
    }
}

impl Configuration {
    pub fn new(
        url_candidates: Vec<String>,
        channel_id: impl Into<String>,
        role: Role,
        multistream_enabled: bool,
    ) -> Self {
        Self {
            url_candidates,
            channel_id: channel_id.into(),
            role,
            multistream_enabled,
            ..Default::default()
        }
    }

    /// Load a configuration snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Configuration = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Multistream is implied by the legacy group roles
    pub fn is_multistream(&self) -> bool {
        match self.role {
            Role::Group | Role::GroupSub => true,
            _ => self.multistream_enabled,
        }
    }

    pub fn is_sender(&self) -> bool {
        self.role.is_sender()
    }

    /// Check the fields the factory and the signaling layer rely on
    pub fn validate(&self) -> Result<()> {
        if self.url_candidates.is_empty() {
            return Err(FactoryError::Config(
                "at least one signaling URL candidate is required".to_string(),
            ));
        }
        for url in &self.url_candidates {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(FactoryError::Config(format!(
                    "signaling URL must use ws:// or wss://: {}",
                    url
                )));
            }
        }
        if self.channel_id.trim().is_empty() {
            return Err(FactoryError::Config("channel_id must not be empty".to_string()));
        }
        if self.simulcast_rid.is_some() && !matches!(self.role, Role::Recvonly | Role::Sendrecv) {
            return Err(FactoryError::Config(format!(
                "simulcast_rid requires role recvonly or sendrecv, got {}",
                self.role
            )));
        }
        for (name, id) in [
            ("publisher_stream_id", &self.publisher_stream_id),
            ("publisher_video_track_id", &self.publisher_video_track_id),
            ("publisher_audio_track_id", &self.publisher_audio_track_id),
        ] {
            if id.is_empty() {
                return Err(FactoryError::Config(format!("{} must not be empty", name)));
            }
        }
        self.webrtc.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Configuration {
        Configuration::new(
            vec!["wss://sora.example.com/signaling".to_string()],
            "sora",
            Role::Sendrecv,
            true,
        )
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.publisher_stream_id, "mainStream");
        assert_eq!(config.publisher_video_track_id, "mainVideo");
        assert_eq!(config.publisher_audio_track_id, "mainAudio");
        assert_eq!(config.connection_timeout_secs, 30);
        assert!(config.video_enabled && config.audio_enabled);
        assert!(!config.simulcast_enabled);
    }

    #[test]
    fn test_role_semantics() {
        assert!(Role::Sendonly.is_sender());
        assert!(Role::Publisher.is_sender());
        assert!(!Role::Recvonly.is_sender());
        assert!(!Role::GroupSub.is_sender());

        let mut config = sample();
        config.multistream_enabled = false;
        config.role = Role::Group;
        assert!(config.is_multistream());
        config.role = Role::Sendonly;
        assert!(!config.is_multistream());
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.url_candidates.clear();
        assert!(matches!(config.validate(), Err(FactoryError::Config(_))));

        let mut config = sample();
        config.url_candidates = vec!["https://example.com".to_string()];
        assert!(config.validate().is_err());

        let mut config = sample();
        config.role = Role::Sendonly;
        config.simulcast_rid = Some(SimulcastRid::R1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "url_candidates": ["wss://a.example.com/signaling"],
                "channel_id": "room",
                "role": "sendonly",
                "video_codec": "vp9",
                "simulcast_enabled": true
            }}"#
        )
        .unwrap();

        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.channel_id, "room");
        assert_eq!(config.role, Role::Sendonly);
        assert_eq!(config.video_codec, VideoCodec::VP9);
        assert!(config.simulcast_enabled);
        assert_eq!(config.publisher_stream_id, "mainStream");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let err = Configuration::from_json(r#"{"channel_id": "room"}"#).unwrap_err();
        assert!(matches!(err, FactoryError::Config(_)));
    }
}
