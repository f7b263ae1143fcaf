//! Error types for Coachline
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Coachline operations
///
/// Covers configuration loading, transport exchanges (streaming and
/// one-shot), conversation lookups, and send state-machine violations.
#[derive(Error, Debug)]
pub enum CoachlineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failures (non-success status, malformed reply)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure while a streaming exchange was in progress
    #[error("Stream error: {0}")]
    Stream(String),

    /// Streaming not supported by the transport
    #[error("Streaming is not supported by this transport")]
    StreamingNotSupported,

    /// The backend does not know the requested conversation
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// A send state-machine transition that is not allowed
    #[error("Illegal send transition: {from} -> {to}")]
    IllegalTransition {
        /// State the machine was in
        from: String,
        /// State that was requested
        to: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Coachline operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to downcast to [`CoachlineError`].
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = CoachlineError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_transport_error_display() {
        let error = CoachlineError::Transport("HTTP 502".to_string());
        assert_eq!(error.to_string(), "Transport error: HTTP 502");
    }

    #[test]
    fn test_stream_error_display() {
        let error = CoachlineError::Stream("connection reset".to_string());
        assert_eq!(error.to_string(), "Stream error: connection reset");
    }

    #[test]
    fn test_streaming_not_supported_error() {
        let error = CoachlineError::StreamingNotSupported;
        assert_eq!(
            error.to_string(),
            "Streaming is not supported by this transport"
        );
    }

    #[test]
    fn test_conversation_not_found_display() {
        let error = CoachlineError::ConversationNotFound("conv-1".to_string());
        assert_eq!(error.to_string(), "Conversation not found: conv-1");
    }

    #[test]
    fn test_illegal_transition_display() {
        let error = CoachlineError::IllegalTransition {
            from: "sending".to_string(),
            to: "sending".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Illegal send transition: sending -> sending"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CoachlineError = io_error.into();
        assert!(matches!(error, CoachlineError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: CoachlineError = json_error.into();
        assert!(matches!(error, CoachlineError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: CoachlineError = yaml_error.into();
        assert!(matches!(error, CoachlineError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CoachlineError>();
    }
}
