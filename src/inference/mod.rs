//! Completion backend collaborator.
//!
//! This module defines what the agent needs from a chat-completion service:
//! - The `CompletionBackend` trait (non-streaming and streamed completions)
//! - Request/response types and the closed message-role set
//! - Completion sampling configuration
//! - Draining of streamed content fragments into a caller sink
//!
//! Concrete HTTP clients live outside the crate and implement the trait.

pub mod backend;
pub mod config;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use backend::{build_request, CompletionBackend, DeltaStream};
pub use config::CompletionConfig;
pub use errors::InferenceError;
pub use types::{
    ChatCompletionRequest, ChatMessage, Completion, CompletionChoice, Message, Role,
    ToolCallRequest, ToolDefinition, Usage,
};
