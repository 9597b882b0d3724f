//! Agent Core error types.

use thiserror::Error;

use crate::inference::errors::InferenceError;
use crate::inference::streaming::DrainError;
use crate::mcp_client::errors::McpError;

use super::types::ChatResponse;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A caller-supplied argument is unusable (empty session id, malformed
    /// tool-call arguments).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Session not found.
    #[error("session not found: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// The request itself is malformed (empty transcript, unknown role).
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// A required collaborator is not configured.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Completion backend failure.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Tool provider failure.
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// The delta sink rejected a fragment; the stream was abandoned.
    #[error("stream aborted: {reason}")]
    StreamAborted { reason: String },

    /// The caller cancelled the turn.
    #[error("chat turn cancelled")]
    Cancelled,

    /// The turn completed but the exchange could not be saved. The answer is
    /// still available in `response`.
    #[error("failed to persist session '{session_id}': {reason}")]
    Persistence {
        session_id: String,
        reason: String,
        response: Box<ChatResponse>,
    },
}

impl From<DrainError> for AgentError {
    fn from(e: DrainError) -> Self {
        match e {
            DrainError::Stream(inner) => AgentError::Inference(inner),
            DrainError::Sink(sink) => AgentError::StreamAborted {
                reason: format!("{sink:#}"),
            },
        }
    }
}

impl AgentError {
    pub(crate) fn empty_session_id() -> Self {
        AgentError::InvalidArgument {
            reason: "session id must not be empty".into(),
        }
    }

    /// The answer produced before the error, if any.
    pub fn response(&self) -> Option<&ChatResponse> {
        match self {
            AgentError::Persistence { response, .. } => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: AgentError = InferenceError::EmptyResponse.into();
        assert!(matches!(err, AgentError::Inference(InferenceError::EmptyResponse)));
        assert_eq!(err.to_string(), "completion response contained no choices");

        let err: AgentError = McpError::UnknownTool { name: "x".into() }.into();
        assert!(matches!(err, AgentError::Mcp(_)));
        assert!(err.response().is_none());
    }

    #[test]
    fn test_sink_error_becomes_stream_aborted() {
        let sink = anyhow::anyhow!("socket closed").context("forwarding delta");
        let err: AgentError = DrainError::Sink(sink).into();
        match err {
            AgentError::StreamAborted { reason } => {
                assert!(reason.contains("forwarding delta"));
                assert!(reason.contains("socket closed"));
            }
            other => panic!("expected StreamAborted, got {other:?}"),
        }
    }
}
