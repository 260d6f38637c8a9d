//! Local media sources, tracks and streams
//!
//! Tracks are engine-independent until they are registered with a peer
//! connection; the RTP-level track is created at registration time with the
//! owning stream id.

use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};

use super::codec::{CodecInfo, VideoEncoder};
use super::engine::audio_codec_capability;
use crate::config::MediaConstraints;

/// Track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn codec_type(&self) -> RTPCodecType {
        match self {
            TrackKind::Video => RTPCodecType::Video,
            TrackKind::Audio => RTPCodecType::Audio,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Video position of a sender stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSlot {
    Absent,
    Video(String),
}

impl VideoSlot {
    pub fn video(track_id: impl Into<String>) -> Self {
        VideoSlot::Video(track_id.into())
    }

    pub fn is_present(&self) -> bool {
        matches!(self, VideoSlot::Video(_))
    }
}

/// Audio position of a sender stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSlot {
    Absent,
    Audio(String),
}

impl AudioSlot {
    pub fn audio(track_id: impl Into<String>) -> Self {
        AudioSlot::Audio(track_id.into())
    }

    pub fn is_present(&self) -> bool {
        matches!(self, AudioSlot::Audio(_))
    }
}

/// Video capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    source_id: String,
}

impl VideoSource {
    pub(crate) fn new() -> Self {
        Self {
            source_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// Audio source configured by media constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    source_id: String,
    constraints: MediaConstraints,
}

impl AudioSource {
    pub(crate) fn new(constraints: MediaConstraints) -> Self {
        Self {
            source_id: uuid::Uuid::new_v4().to_string(),
            constraints,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn constraints(&self) -> &MediaConstraints {
        &self.constraints
    }
}

/// A track that can be registered with a peer connection
pub trait LocalTrack: Send + Sync {
    fn track_id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    /// Codec the RTP-level track is created with
    fn rtp_capability(&self) -> RTCRtpCodecCapability;
}

/// Local video track
#[derive(Debug, Clone)]
pub struct VideoTrack {
    track_id: String,
    source: VideoSource,
    codec: CodecInfo,
    encoder: Option<VideoEncoder>,
}

impl VideoTrack {
    pub(crate) fn new(
        track_id: String,
        source: VideoSource,
        codec: CodecInfo,
        encoder: Option<VideoEncoder>,
    ) -> Self {
        Self {
            track_id,
            source,
            codec,
            encoder,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn codec(&self) -> &CodecInfo {
        &self.codec
    }

    /// Encoder instantiated for this track by the factory active at creation
    pub fn encoder(&self) -> Option<&VideoEncoder> {
        self.encoder.as_ref()
    }
}

impl LocalTrack for VideoTrack {
    fn track_id(&self) -> &str {
        &self.track_id
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn rtp_capability(&self) -> RTCRtpCodecCapability {
        self.codec.to_rtp_capability()
    }
}

/// Local audio track
#[derive(Debug, Clone)]
pub struct AudioTrack {
    track_id: String,
    source: AudioSource,
}

impl AudioTrack {
    pub(crate) fn new(track_id: String, source: AudioSource) -> Self {
        Self { track_id, source }
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }
}

impl LocalTrack for AudioTrack {
    fn track_id(&self) -> &str {
        &self.track_id
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn rtp_capability(&self) -> RTCRtpCodecCapability {
        audio_codec_capability()
    }
}

/// Local media stream holding at most one video and one audio track
#[derive(Debug, Clone)]
pub struct MediaStream {
    stream_id: String,
    video_track: Option<VideoTrack>,
    audio_track: Option<AudioTrack>,
}

impl MediaStream {
    pub(crate) fn new(
        stream_id: String,
        video_track: Option<VideoTrack>,
        audio_track: Option<AudioTrack>,
    ) -> Self {
        Self {
            stream_id,
            video_track,
            audio_track,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn video_track(&self) -> Option<&VideoTrack> {
        self.video_track.as_ref()
    }

    pub fn audio_track(&self) -> Option<&AudioTrack> {
        self.audio_track.as_ref()
    }

    pub fn track_count(&self) -> usize {
        usize::from(self.video_track.is_some()) + usize::from(self.audio_track.is_some())
    }

    /// All tracks, video first
    pub fn tracks(&self) -> Vec<&dyn LocalTrack> {
        let mut tracks: Vec<&dyn LocalTrack> = Vec::with_capacity(2);
        if let Some(ref video) = self.video_track {
            tracks.push(video);
        }
        if let Some(ref audio) = self.audio_track {
            tracks.push(audio);
        }
        tracks
    }
}
