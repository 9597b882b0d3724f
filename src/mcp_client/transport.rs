//! Tool provider transport seam.
//!
//! The manager drives the protocol (start → initialize → list tools → call /
//! ping) through [`ToolTransport`] and never touches framing or I/O itself.
//! A [`TransportConnector`] turns an endpoint URL into a fresh transport; the
//! manager opens a new one for every connect and reconnect attempt.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::McpError;
use super::types::{ClientInfo, ContentItem, InitializeResult, ToolArguments, ToolDescriptor};

/// One live session with a tool provider.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Bring the underlying channel up (open the stream, spawn readers).
    async fn start(&self) -> Result<(), McpError>;

    /// Perform the initialize handshake.
    async fn initialize(&self, client: &ClientInfo) -> Result<InitializeResult, McpError>;

    /// Fetch the advertised tool catalog.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Execute a tool and return its content items.
    async fn call_tool(
        &self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<Vec<ContentItem>, McpError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), McpError>;

    /// Release the channel. Errors are logged by the caller and otherwise ignored.
    async fn close(&self) -> Result<(), McpError> {
        Ok(())
    }
}

/// Factory for transports bound to an endpoint URL.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn ToolTransport>, McpError>;
}
