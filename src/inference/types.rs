//! Shared types for the completion backend.
//!
//! Session-level messages (`Message`) use a closed three-role set. The
//! transcript sent to the backend (`ChatMessage`) additionally carries
//! assistant tool calls and tool results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;

// ─── Messages ────────────────────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(InferenceError::Validation {
                reason: format!("unsupported message role: '{other}'"),
            }),
        }
    }
}

/// A single conversation message as stored in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Build a message from an untyped role string.
    ///
    /// Used at the boundary where roles arrive as text (persisted rows,
    /// adapter payloads). Unknown roles fail with `Validation`.
    pub fn parse(role: &str, content: impl Into<String>) -> Result<Self, InferenceError> {
        Ok(Self::new(role.parse()?, content))
    }
}

/// One entry of the transcript sent to the completion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// Assistant turn; `tool_calls` is non-empty when the model asked for tools.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Result of one tool call, correlated by `tool_call_id`.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let content = msg.content.clone();
        match msg.role {
            Role::System => ChatMessage::System { content },
            Role::User => ChatMessage::User { content },
            Role::Assistant => ChatMessage::Assistant {
                content,
                tool_calls: Vec::new(),
            },
        }
    }
}

// ─── Tools ───────────────────────────────────────────────────────────────────

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model, arguments still in raw JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw argument payload into a JSON object.
    ///
    /// Anything other than a JSON object (including an empty string) is an error.
    pub fn parse_arguments(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

// ─── Request / Response ──────────────────────────────────────────────────────

/// A chat completion request handed to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One candidate answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub content: String,
    pub finish_reason: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// A complete (non-streaming) backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Usage,
}

impl Completion {
    /// Single-choice completion, the common case.
    pub fn single(choice: CompletionChoice, usage: Usage) -> Self {
        Self {
            choices: vec![choice],
            usage,
        }
    }

    /// Take the first choice, failing with `EmptyResponse` when there is none.
    pub fn into_first_choice(self) -> Result<(CompletionChoice, Usage), InferenceError> {
        let usage = self.usage;
        self.choices
            .into_iter()
            .next()
            .map(|choice| (choice, usage))
            .ok_or(InferenceError::EmptyResponse)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
