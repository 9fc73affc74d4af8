//! Error types for hapticsync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HapticError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Directive errors
    #[error("Malformed directive field {field}: {message}")]
    DirectiveParse { field: String, message: String },

    #[error("Command not recognized: [{key}]")]
    UnknownDirective { key: String },

    // Audio container errors
    #[error("Unsupported audio format: {message}")]
    UnsupportedFormat { message: String },

    #[error("Malformed audio container: {message}")]
    AudioFormat { message: String },

    // Actuator errors
    #[error("Compatible device not found for [{action}], command ignored")]
    CapabilityMissing { action: String },

    #[error("Actuator transport error: {message}")]
    Transport { message: String },

    #[error("Actuator protocol error: {message}")]
    Protocol { message: String },

    // Speech synthesis and other upstream services
    #[error("Upstream request failed: {message}")]
    UpstreamRequest { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, HapticError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = HapticError::ConfigInvalidValue {
            key: "speech.words_per_minute".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for speech.words_per_minute: must be positive"
        );
    }

    #[test]
    fn test_unknown_directive_display() {
        let error = HapticError::UnknownDirective {
            key: "foo".to_string(),
        };
        assert_eq!(error.to_string(), "Command not recognized: [foo]");
    }

    #[test]
    fn test_capability_missing_display() {
        let error = HapticError::CapabilityMissing {
            action: "rotate".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Compatible device not found for [rotate], command ignored"
        );
    }

    #[test]
    fn test_unsupported_format_display() {
        let error = HapticError::UnsupportedFormat {
            message: "format tag 3".to_string(),
        };
        assert_eq!(error.to_string(), "Unsupported audio format: format tag 3");
    }

    #[test]
    fn test_transport_display() {
        let error = HapticError::Transport {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Actuator transport error: connection refused"
        );
    }

    #[test]
    fn test_upstream_request_display() {
        let error = HapticError::UpstreamRequest {
            message: "status 500".to_string(),
        };
        assert_eq!(error.to_string(), "Upstream request failed: status 500");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: HapticError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: HapticError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: HapticError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: HapticError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<HapticError>();
        assert_sync::<HapticError>();
    }
}
