use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;

const KEY_OFFER_TO_RECEIVE_AUDIO: &str = "OfferToReceiveAudio";
const KEY_OFFER_TO_RECEIVE_VIDEO: &str = "OfferToReceiveVideo";
const KEY_ICE_RESTART: &str = "IceRestart";
const KEY_VOICE_ACTIVITY_DETECTION: &str = "VoiceActivityDetection";

/// Opaque key/value media constraints, passed through verbatim
///
/// Mandatory entries win over optional ones when both name the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub mandatory: BTreeMap<String, String>,
    pub optional: BTreeMap<String, String>,
}

impl MediaConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mandatory(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mandatory.insert(key.into(), value.into());
        self
    }

    pub fn with_optional(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.optional.insert(key.into(), value.into());
        self
    }

    /// Look up a key, mandatory first
    pub fn get(&self, key: &str) -> Option<&str> {
        self.mandatory
            .get(key)
            .or_else(|| self.optional.get(key))
            .map(String::as_str)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn offer_to_receive_audio(&self) -> bool {
        self.flag(KEY_OFFER_TO_RECEIVE_AUDIO).unwrap_or(false)
    }

    pub fn offer_to_receive_video(&self) -> bool {
        self.flag(KEY_OFFER_TO_RECEIVE_VIDEO).unwrap_or(false)
    }

    /// Offer options derived from the well-known offer keys
    pub fn offer_options(&self) -> RTCOfferOptions {
        RTCOfferOptions {
            ice_restart: self.flag(KEY_ICE_RESTART).unwrap_or(false),
            voice_activity_detection: self.flag(KEY_VOICE_ACTIVITY_DETECTION).unwrap_or(true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.optional.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_wins() {
        let constraints = MediaConstraints::new()
            .with_optional("OfferToReceiveVideo", "false")
            .with_mandatory("OfferToReceiveVideo", "true");
        assert_eq!(constraints.get("OfferToReceiveVideo"), Some("true"));
        assert!(constraints.offer_to_receive_video());
        assert!(!constraints.offer_to_receive_audio());
    }

    #[test]
    fn test_offer_options() {
        let options = MediaConstraints::new().offer_options();
        assert!(!options.ice_restart);
        assert!(options.voice_activity_detection);

        let options = MediaConstraints::new()
            .with_mandatory("IceRestart", "TRUE")
            .with_optional("VoiceActivityDetection", "false")
            .offer_options();
        assert!(options.ice_restart);
        assert!(!options.voice_activity_detection);
    }

    #[test]
    fn test_passthrough_unknown_keys() {
        let constraints = MediaConstraints::new().with_optional("googEchoCancellation", "true");
        assert!(!constraints.is_empty());
        assert_eq!(constraints.get("googEchoCancellation"), Some("true"));
        assert_eq!(constraints.get("missing"), None);
    }
}
