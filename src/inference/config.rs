//! Completion backend configuration.
//!
//! Every field has a serde default so a partial `completion:` block in
//! `agent.yaml` is enough. The API key is normally injected through
//! `${OPENAI_API_KEY}` interpolation rather than written to the file.

use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Settings handed to the completion backend on every request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Deadline for one non-streaming completion.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Deadline for a whole streamed completion, first byte to last.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_stream_timeout_secs() -> u64 {
    180
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            stream_timeout_secs: default_stream_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    /// Reject values no backend would accept.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.base_url.trim().is_empty() {
            return Err(InferenceError::Config {
                reason: "completion base_url must not be empty".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(InferenceError::Config {
                reason: "completion model must not be empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InferenceError::Config {
                reason: format!("temperature {} outside 0.0..=2.0", self.temperature),
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(InferenceError::Config {
                reason: format!("top_p {} outside 0.0..=1.0", self.top_p),
            });
        }
        if self.max_tokens == 0 {
            return Err(InferenceError::Config {
                reason: "max_tokens must be greater than zero".into(),
            });
        }
        if self.timeout_secs == 0 || self.stream_timeout_secs == 0 {
            return Err(InferenceError::Config {
                reason: "completion timeouts must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: CompletionConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, CompletionConfig::default());
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CompletionConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(InferenceError::Config { .. })));

        let config = CompletionConfig {
            base_url: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CompletionConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
