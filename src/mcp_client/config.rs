//! Tool provider connection settings.

use std::time::Duration;

use serde::Deserialize;

use super::errors::McpError;
use super::types::ClientInfo;

/// Round budget applied when `max_tool_calls` is configured as 0.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 10;

/// Per-call deadline applied when `tool_call_timeout_secs` is configured as 0.
pub const DEFAULT_TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one tool provider endpoint.
///
/// Durations are whole seconds in YAML except `retry_delay_ms`, which is
/// milliseconds so short backoffs can be expressed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolProviderConfig {
    /// Endpoint URL handed to the transport connector.
    #[serde(default)]
    pub url: String,
    /// Expected server name from the handshake. Empty disables the check.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Health-check period. 0 disables the health task.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound on tool-call rounds per turn.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
    #[serde(default = "default_tool_call_timeout_secs")]
    pub tool_call_timeout_secs: u64,
    /// Gate for lifecycle info events (connect, catalog, reconnect).
    #[serde(default = "default_true")]
    pub enable_logging: bool,
    /// Gate for the per-invocation name + arguments event.
    #[serde(default = "default_true")]
    pub log_tool_calls: bool,
}

fn default_server_name() -> String {
    "mcp-server".into()
}
fn default_client_name() -> String {
    "agent-client".into()
}
fn default_client_version() -> String {
    "1.0.0".into()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_ping_interval_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2_000
}
fn default_max_tool_calls() -> u32 {
    DEFAULT_MAX_TOOL_CALLS
}
fn default_tool_call_timeout_secs() -> u64 {
    30
}

impl Default for ToolProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            server_name: default_server_name(),
            client_name: default_client_name(),
            client_version: default_client_version(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            auto_reconnect: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_tool_calls: default_max_tool_calls(),
            tool_call_timeout_secs: default_tool_call_timeout_secs(),
            enable_logging: true,
            log_tool_calls: true,
        }
    }
}

impl ToolProviderConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            name: self.client_name.clone(),
            version: self.client_version.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Effective round budget; 0 means the default of 10.
    pub fn effective_max_tool_calls(&self) -> u32 {
        if self.max_tool_calls == 0 {
            DEFAULT_MAX_TOOL_CALLS
        } else {
            self.max_tool_calls
        }
    }

    /// Effective per-call deadline; 0 means the default of 30s.
    pub fn tool_call_timeout(&self) -> Duration {
        if self.tool_call_timeout_secs == 0 {
            DEFAULT_TOOL_CALL_TIMEOUT
        } else {
            Duration::from_secs(self.tool_call_timeout_secs)
        }
    }

    /// Whether the background health task should run once connected.
    pub fn health_check_enabled(&self) -> bool {
        self.auto_reconnect && self.ping_interval_secs > 0
    }

    pub fn validate(&self) -> Result<(), McpError> {
        if self.url.trim().is_empty() {
            return Err(McpError::Config {
                reason: "tool provider url must not be empty".into(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(McpError::Config {
                reason: "connect_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ToolProviderConfig =
            serde_yaml::from_str("url: http://localhost:8080/mcp").unwrap();
        assert_eq!(config.server_name, "mcp-server");
        assert_eq!(config.client_info().name, "agent-client");
        assert_eq!(config.client_info().version, "1.0.0");
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.ping_interval(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
        assert!(config.health_check_enabled());
        assert!(config.log_tool_calls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_fall_back() {
        let config = ToolProviderConfig {
            max_tool_calls: 0,
            tool_call_timeout_secs: 0,
            ping_interval_secs: 0,
            ..ToolProviderConfig::with_url("http://x")
        };
        assert_eq!(config.effective_max_tool_calls(), 10);
        assert_eq!(config.tool_call_timeout(), Duration::from_secs(30));
        assert!(!config.health_check_enabled());
    }

    #[test]
    fn test_empty_url_is_config_error() {
        let err = ToolProviderConfig::default().validate().unwrap_err();
        assert!(matches!(err, McpError::Config { .. }));
    }
}
