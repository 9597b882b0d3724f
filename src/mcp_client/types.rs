//! Shared types for the tool provider client.
//!
//! Handshake payloads, tool descriptors, call results, and the connection
//! state published by the manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tool call arguments: always a JSON object.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

// ─── Handshake ───────────────────────────────────────────────────────────────

/// Identity the client advertises during `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Initialize response payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(default, alias = "serverInfo")]
    pub server_info: ServerInfo,
}

// ─── Tools ───────────────────────────────────────────────────────────────────

/// A tool advertised by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// Names listed under the schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// One content item of a tool call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(alias = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
    /// Content kinds this client does not interpret.
    #[serde(other)]
    Other,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }
}

/// First textual item of a result, if any.
pub fn first_text(content: &[ContentItem]) -> Option<&str> {
    content.iter().find_map(|item| match item {
        ContentItem::Text { text } => Some(text.as_str()),
        _ => None,
    })
}

// ─── Connection state ────────────────────────────────────────────────────────

/// Lifecycle state of the tool provider connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
