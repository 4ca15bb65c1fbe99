//! Error types for eventdoc.
//!
//! This module defines all error types used throughout the eventdoc crate.
//! Every failure is scoped to a single operation (one fetch, one save, one
//! browse command) and can be retried; nothing here is fatal to the process.

use thiserror::Error;

use crate::browse::EditorMode;

/// The main error type for eventdoc operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A required field is missing or malformed. Raised before any network call.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Wire name of the offending field.
        field: &'static str,
        /// Description of the validation failure.
        message: String,
    },

    // === Gateway Errors ===
    /// The request never produced a usable response.
    #[error("{operation} failed: {message}")]
    Transport {
        /// The gateway operation that failed.
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("{operation} failed: {status} {body}")]
    Server {
        /// The gateway operation that failed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, if any was readable.
        body: String,
    },

    // === Record Errors ===
    /// A text-encoded JSON field could not be parsed.
    #[error("malformed JSON in {field}: {message}")]
    Parse {
        /// Name of the record field.
        field: &'static str,
        /// The underlying parser message.
        message: String,
    },

    /// No record with the given name exists in the catalog.
    #[error("event not found: {name}")]
    EventNotFound {
        /// The requested event name.
        name: String,
    },

    // === Editor Errors ===
    /// The editor cannot perform the action in its current mode.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// Mode the editor was in.
        from: EditorMode,
        /// The rejected action.
        action: &'static str,
    },

    /// A save is in flight; the buffer is locked until it resolves.
    #[error("a save is already in progress")]
    SaveInProgress,

    // === Browse Errors ===
    /// A browse session command could not be understood.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Terminal or file system I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for eventdoc operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error for the given wire field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a new transport error.
    #[must_use]
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Create a new server error.
    #[must_use]
    pub fn server(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            operation,
            status,
            body: body.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if retrying the same operation might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Server { .. })
    }

    /// Check if this error was raised by local validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// The HTTP status carried by a server error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation("eventName", "must not be empty");
        assert_eq!(err.to_string(), "invalid eventName: must not be empty");
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_error_includes_status_and_body() {
        let err = Error::server("updateEvent", 400, "EventName is required");
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("EventName is required"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_transport_error_is_retryable() {
        let err = Error::transport("getEvents", "connection refused");
        assert!(err.is_retryable());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "getEvents failed: connection refused");
    }

    #[test]
    fn test_server_error_is_retryable() {
        assert!(Error::server("getEvents", 500, "").is_retryable());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition {
            from: EditorMode::Viewing,
            action: "save",
        };
        assert_eq!(err.to_string(), "cannot save while viewing");
    }

    #[test]
    fn test_event_not_found_display() {
        let err = Error::EventNotFound {
            name: "page_view".to_string(),
        };
        assert!(err.to_string().contains("page_view"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("stdout closed"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "timeout_secs must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_save_in_progress_is_not_retryable() {
        assert!(!Error::SaveInProgress.is_retryable());
    }
}
