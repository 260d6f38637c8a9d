use thiserror::Error;

/// Error type shared by the factory, the offer probe and configuration loading
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("peer connection creation failed: {0}")]
    PeerConnectionCreation(String),

    #[error("offer generation failed: {0}")]
    OfferGeneration(String),

    #[error("offer probe cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebRTC error: {0}")]
    WebRtc(String),
}

impl FactoryError {
    /// Whether the failure happened before any connection object existed
    pub fn is_creation_failure(&self) -> bool {
        matches!(self, FactoryError::PeerConnectionCreation(_))
    }
}

/// Result type alias for factory operations
pub type Result<T> = std::result::Result<T, FactoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_error_message() {
        let err = FactoryError::PeerConnectionCreation("invalid ICE server".to_string());
        assert!(err.is_creation_failure());
        assert_eq!(
            err.to_string(),
            "peer connection creation failed: invalid ICE server"
        );
        assert!(!FactoryError::Cancelled.is_creation_failure());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: FactoryError = parse.unwrap_err().into();
        assert!(matches!(err, FactoryError::Serialization(_)));
    }
}
