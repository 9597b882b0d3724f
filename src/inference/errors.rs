//! Completion backend error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to the completion backend.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The backend call failed (transport, HTTP status, decoding).
    #[error("completion backend error: {reason}")]
    Backend {
        reason: String,
    },

    /// The backend did not answer within the request deadline.
    #[error("completion request timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    /// The backend answered with zero choices.
    #[error("completion response contained no choices")]
    EmptyResponse,

    /// A message could not be mapped onto the closed role set, or the
    /// transcript itself is unusable.
    #[error("invalid message: {reason}")]
    Validation {
        reason: String,
    },

    /// A delta stream failed mid-flight.
    #[error("stream error: {reason}")]
    Stream {
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    Config {
        reason: String,
    },
}

impl InferenceError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferenceError::Backend { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::Stream { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_carries_duration() {
        let err = InferenceError::Timeout { duration_ms: 1500 };
        assert_eq!(err.to_string(), "completion request timed out after 1500ms");
    }

    #[test]
    fn test_is_transient() {
        assert!(InferenceError::Backend { reason: "502".into() }.is_transient());
        assert!(InferenceError::Timeout { duration_ms: 5 }.is_transient());
        assert!(!InferenceError::EmptyResponse.is_transient());
        assert!(!InferenceError::Validation { reason: "role".into() }.is_transient());
        assert!(!InferenceError::Config { reason: "url".into() }.is_transient());
    }
}
