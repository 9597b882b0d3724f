//! Tool provider error types.

use thiserror::Error;

/// Errors that can occur while managing or calling the tool provider.
#[derive(Debug, Error)]
pub enum McpError {
    /// Configuration error (missing endpoint URL, bad values).
    #[error("config error: {reason}")]
    Config {
        reason: String,
    },

    /// The endpoint could not be reached, the connect deadline passed, or the
    /// manager is not connected.
    #[error("connection to '{url}' failed: {reason}")]
    Connection {
        url: String,
        reason: String,
    },

    /// The initialize handshake failed or the server identified itself
    /// under an unexpected name.
    #[error("handshake failed: {reason}")]
    Handshake {
        reason: String,
    },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: String,
        timeout_ms: u64,
    },

    /// Tool not found in the cached catalog.
    #[error("unknown tool: '{name}'")]
    UnknownTool {
        name: String,
    },

    /// Tool call arguments are missing fields the schema requires.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments {
        tool: String,
        reason: String,
    },

    /// The tool ran but the call failed or produced no textual content.
    #[error("tool '{tool}' failed: {reason}")]
    ToolInvocation {
        tool: String,
        reason: String,
    },

    /// Error reported by the transport itself (framing, I/O, remote error).
    #[error("transport error: {reason}")]
    Transport {
        reason: String,
    },
}

impl McpError {
    pub(crate) fn not_connected(url: &str) -> Self {
        McpError::Connection {
            url: url.to_string(),
            reason: "not connected".into(),
        }
    }
}
