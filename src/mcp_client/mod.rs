//! MCP Client: lifecycle management for an external tool provider.
//!
//! This module handles:
//! - Connecting and handshaking through an injected transport
//! - Caching the advertised tool catalog and converting it for the backend
//! - Tool call validation and execution with per-call deadlines
//! - Background health checks with bounded, delayed reconnects
//!
//! The wire protocol lives behind `ToolTransport`; this module only drives it.

pub mod config;
pub mod errors;
pub mod manager;
pub mod registry;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::ToolProviderConfig;
pub use errors::McpError;
pub use manager::ToolProviderManager;
pub use registry::ToolCatalog;
pub use transport::{ToolTransport, TransportConnector};
pub use types::{
    ClientInfo, ConnectionState, ContentItem, InitializeResult, ServerInfo, ToolArguments,
    ToolDescriptor,
};
