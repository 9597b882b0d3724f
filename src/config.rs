//! Agent configuration loading.
//!
//! `agent.yaml` holds three sections:
//!
//! ```yaml
//! completion:
//!   api_key: ${OPENAI_API_KEY}
//!   model: gpt-4o-mini
//! tool_provider:
//!   url: ${TOOLS_URL:-http://localhost:8931/sse}
//!   max_tool_calls: 5
//! session:
//!   max_messages: 50
//! ```
//!
//! Every field has a default; `tool_provider` may be omitted entirely.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::agent_core::errors::AgentError;
use crate::agent_core::session_store::DEFAULT_MAX_MESSAGES;
use crate::inference::config::CompletionConfig;
use crate::mcp_client::config::ToolProviderConfig;

/// File name searched for by [`find_config_path`].
pub const CONFIG_FILE_NAME: &str = "agent.yaml";

/// Env var naming a directory that contains `agent.yaml`.
pub const ROOT_ENV_VAR: &str = "GROUPCHAT_AGENT_ROOT";

// ─── Config types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub tool_provider: Option<ToolProviderConfig>,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    /// Per-session capacity; 0 means the default of 100.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        self.completion.validate()?;
        if let Some(provider) = &self.tool_provider {
            provider.validate()?;
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate `agent.yaml`.
///
/// Checks `$GROUPCHAT_AGENT_ROOT` first, then walks upward from `start`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, AgentError> {
    if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
        let candidate = PathBuf::from(&root).join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(AgentError::Config {
        reason: format!("could not find {CONFIG_FILE_NAME}"),
    })
}

/// Read, interpolate and parse a config file, then validate it.
///
/// `${VAR_NAME}` and `${VAR_NAME:-default}` are replaced before parsing.
pub fn load_config(path: &Path) -> Result<AgentConfig, AgentError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let config = parse_config(&raw)?;
    tracing::info!(
        path = %path.display(),
        model = %config.completion.model,
        tool_provider = config.tool_provider.is_some(),
        "loaded agent config"
    );
    Ok(config)
}

/// Parse config text (after interpolation) and validate it.
pub fn parse_config(raw: &str) -> Result<AgentConfig, AgentError> {
    let interpolated = interpolate_env_vars(raw);
    let config: AgentConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| AgentError::Config {
            reason: format!("failed to parse config: {e}"),
        })?;
    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut expr = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            expr.push(c);
        }

        if closed {
            result.push_str(&resolve_var_expr(&expr));
        } else {
            // Unterminated: keep the text as written.
            result.push_str("${");
            result.push_str(&expr);
        }
    }

    result
}

/// `VAR` or `VAR:-default`; an unset or empty variable takes the default.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
