//! The completion backend seam.
//!
//! The crate never speaks the completion API's wire format itself. A caller
//! plugs in whatever client they use (HTTP, a local runtime, a test double)
//! by implementing [`CompletionBackend`].

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::config::CompletionConfig;
use super::errors::InferenceError;
use super::types::{ChatCompletionRequest, ChatMessage, Completion, ToolDefinition};

/// Stream of content fragments produced by a streamed completion.
pub type DeltaStream = BoxStream<'static, Result<String, InferenceError>>;

/// An OpenAI-style chat completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return every choice plus token usage.
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion, InferenceError>;

    /// Start a streamed completion.
    ///
    /// The outer `Result` covers failures before the first fragment; errors
    /// after that arrive as items of the stream.
    async fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<DeltaStream, InferenceError>;
}

/// Build a request from the configured sampling parameters.
///
/// `tools` is forwarded only when non-empty; an empty catalog is sent as no
/// catalog at all so plain and tool-augmented requests look identical to the
/// backend when no tools exist.
pub fn build_request(
    config: &CompletionConfig,
    messages: Vec<ChatMessage>,
    tools: Option<Vec<ToolDefinition>>,
    stream: bool,
) -> ChatCompletionRequest {
    let tools = tools.filter(|t| !t.is_empty());
    let tool_choice = tools.as_ref().map(|_| "auto".to_string());
    ChatCompletionRequest {
        model: config.model.clone(),
        messages,
        tools,
        tool_choice,
        temperature: config.temperature,
        top_p: Some(config.top_p),
        max_tokens: config.max_tokens,
        stream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{FunctionDefinition, Message};

    #[test]
    fn test_build_request_uses_config() {
        let config = CompletionConfig {
            model: "gpt-4o-mini".into(),
            max_tokens: 512,
            ..Default::default()
        };
        let req = build_request(&config, vec![ChatMessage::from(&Message::user("hi"))], None, false);
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.max_tokens, 512);
        assert_eq!(req.top_p, Some(1.0));
        assert!(req.tools.is_none());
        assert!(req.tool_choice.is_none());
        assert!(!req.stream);
    }

    #[test]
    fn test_build_request_drops_empty_catalog() {
        let config = CompletionConfig::default();
        let req = build_request(&config, vec![], Some(vec![]), true);
        assert!(req.tools.is_none());
        assert!(req.stream);

        let tool = ToolDefinition {
            r#type: "function".into(),
            function: FunctionDefinition {
                name: "weather".into(),
                description: "Look up the weather".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
        };
        let req = build_request(&config, vec![], Some(vec![tool]), false);
        assert_eq!(req.tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(req.tool_choice.as_deref(), Some("auto"));
    }
}
