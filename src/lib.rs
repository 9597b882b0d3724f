//! groupchat-agent: conversational agent core.
//!
//! Turns a stateless chat-completion backend and a stateless tool provider
//! into a stateful, tool-augmented, multi-turn agent:
//!
//! - `agent_core`: `ChatOrchestrator`, bounded session memory, the tool-call loop
//! - `mcp_client`: tool provider connection lifecycle, catalog cache, invocation
//! - `inference`: completion backend seam, request/response types, delta draining
//! - `config`: `agent.yaml` loading with env-var interpolation
//!
//! Backends and transports are traits; callers supply the wire implementations.

pub mod agent_core;
pub mod config;
pub mod inference;
pub mod mcp_client;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_core::{
    session_key, AgentError, ChatOrchestrator, ChatResponse, MemorySessionStore,
    SessionInfo, SessionPersistence, TurnOutcome,
};
pub use config::{find_config_path, load_config, AgentConfig, SessionConfig};
pub use inference::{CompletionBackend, CompletionConfig, InferenceError, Message, Role};
pub use mcp_client::{
    ConnectionState, McpError, ToolProviderConfig, ToolProviderManager, ToolTransport,
    TransportConnector,
};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "groupchat_agent=info,warn";

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG`, falling back to `groupchat_agent=info,warn`.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        format = ?format,
        "=== groupchat-agent tracing initialized ==="
    );
    Ok(())
}
