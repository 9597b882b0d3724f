//! Chat orchestrator: turns a stateless completion backend into a
//! stateful, tool-augmented conversational agent.
//!
//! Composition:
//! 1. **Session memory** (optional): history is loaded before and saved after each turn
//! 2. **Tool provider** (optional): when connected, its catalog is offered to the
//!    model and tool calls run through the bounded loop in `tool_loop`
//! 3. **Completion backend**: every call carries a deadline and honors cancellation
//!
//! Without a store the orchestrator is stateless; without a connected provider
//! every path degrades to plain chat.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::inference::backend::{build_request, CompletionBackend};
use crate::inference::config::CompletionConfig;
use crate::inference::errors::InferenceError;
use crate::inference::streaming::drain_deltas;
use crate::inference::types::{ChatCompletionRequest, ChatMessage, Completion, Message, ToolDefinition};
use crate::mcp_client::errors::McpError;
use crate::mcp_client::manager::ToolProviderManager;
use crate::mcp_client::transport::TransportConnector;
use crate::mcp_client::types::ToolDescriptor;

use super::errors::AgentError;
use super::session_store::{MemorySessionStore, SessionPersistence};
use super::types::{ChatResponse, SessionInfo};

// ─── ChatOrchestrator ───────────────────────────────────────────────────────

pub struct ChatOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    config: CompletionConfig,
    store: Option<Arc<dyn SessionPersistence>>,
    tools: Option<Arc<ToolProviderManager>>,
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: CompletionConfig) -> Self {
        Self {
            backend,
            config,
            store: None,
            tools: None,
        }
    }

    /// Build the full stack from a loaded [`AgentConfig`].
    ///
    /// Always attaches an in-memory session store. A tool provider manager is
    /// attached when the config has a `tool_provider` section and a connector
    /// is supplied; it still has to be connected by the caller.
    pub fn from_config(
        config: &AgentConfig,
        backend: Arc<dyn CompletionBackend>,
        connector: Option<Arc<dyn TransportConnector>>,
    ) -> Result<Self, AgentError> {
        config.validate()?;

        let store = Arc::new(MemorySessionStore::new(config.session.max_messages));
        let mut orchestrator = Self::new(backend, config.completion.clone()).with_store(store);

        match (&config.tool_provider, connector) {
            (Some(provider), Some(connector)) => {
                let manager = ToolProviderManager::new(provider.clone(), connector);
                orchestrator = orchestrator.with_tool_provider(Arc::new(manager));
            }
            (Some(provider), None) => {
                tracing::warn!(url = %provider.url, "tool provider configured but no connector supplied");
            }
            _ => {}
        }
        Ok(orchestrator)
    }

    pub fn with_store(mut self, store: Arc<dyn SessionPersistence>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tool_provider(mut self, manager: Arc<ToolProviderManager>) -> Self {
        self.tools = Some(manager);
        self
    }

    pub fn completion_config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn tool_provider(&self) -> Option<&Arc<ToolProviderManager>> {
        self.tools.as_ref()
    }

    // ─── Single-shot chat ───────────────────────────────────────────────

    /// One completion over `messages`, no tools.
    pub async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, AgentError> {
        self.chat_cancellable(messages, &CancellationToken::new()).await
    }

    pub async fn chat_cancellable(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let transcript = to_transcript(messages)?;
        let request = build_request(&self.config, transcript, None, false);
        let (choice, usage) = self.complete_request(request, cancel).await?.into_first_choice()?;
        Ok(ChatResponse::completed(choice.content, choice.finish_reason, usage))
    }

    pub async fn simple_chat(&self, text: &str) -> Result<ChatResponse, AgentError> {
        self.chat(&[Message::user(text)]).await
    }

    pub async fn chat_with_system(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<ChatResponse, AgentError> {
        self.chat(&seed_turn(system_prompt, text)).await
    }

    // ─── Tool-augmented chat ────────────────────────────────────────────

    /// Chat with the provider's tools; identical to [`chat`](Self::chat) when
    /// no provider is attached or it is not connected.
    pub async fn chat_with_tools(&self, messages: &[Message]) -> Result<ChatResponse, AgentError> {
        self.chat_with_tools_cancellable(messages, &CancellationToken::new())
            .await
    }

    pub async fn chat_with_tools_cancellable(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let Some((manager, tools)) = self.connected_tools() else {
            return self.chat_cancellable(messages, cancel).await;
        };
        let transcript = to_transcript(messages)?;
        self.run_tool_loop(manager, tools, transcript, cancel).await
    }

    /// Attached manager plus its catalog, only while connected.
    fn connected_tools(&self) -> Option<(&ToolProviderManager, Vec<ToolDefinition>)> {
        let manager = self.tools.as_deref()?;
        if !manager.is_connected() {
            tracing::debug!("tool provider not connected, using plain chat");
            return None;
        }
        match manager.get_tools() {
            Ok(tools) => Some((manager, tools)),
            Err(e) => {
                tracing::debug!(error = %e, "tool catalog unavailable, using plain chat");
                None
            }
        }
    }

    // ─── Session chat ───────────────────────────────────────────────────

    /// One turn inside a session.
    ///
    /// Loads history, seeds `system_prompt` into an empty session, runs the
    /// turn (with tools when connected), then saves the user message and the
    /// answer. Concurrent calls for the same session are not serialized.
    pub async fn chat_with_session(
        &self,
        session_id: &str,
        system_prompt: &str,
        text: &str,
    ) -> Result<ChatResponse, AgentError> {
        self.chat_with_session_cancellable(session_id, system_prompt, text, &CancellationToken::new())
            .await
    }

    pub async fn chat_with_session_cancellable(
        &self,
        session_id: &str,
        system_prompt: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let Some(store) = self.store.as_deref() else {
            return self
                .chat_with_tools_cancellable(&seed_turn(system_prompt, text), cancel)
                .await;
        };
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        let user = Message::user(text);
        let mut history = self.load_history(store, session_id, system_prompt).await?;
        history.push(user.clone());

        tracing::info!(session_id, history = history.len(), "chat turn");
        let response = self.chat_with_tools_cancellable(&history, cancel).await?;

        persist_exchange(store, session_id, user, response, ReplyPolicy::Always).await
    }

    // ─── Streaming ──────────────────────────────────────────────────────

    /// Stream one completion, forwarding each fragment to `on_delta`.
    ///
    /// A sink error aborts the call with `StreamAborted`. Tools are not
    /// offered on the streaming path.
    pub async fn chat_stream<F>(&self, messages: &[Message], on_delta: F) -> Result<ChatResponse, AgentError>
    where
        F: FnMut(&str) -> anyhow::Result<()> + Send,
    {
        self.chat_stream_cancellable(messages, on_delta, &CancellationToken::new())
            .await
    }

    pub async fn chat_stream_cancellable<F>(
        &self,
        messages: &[Message],
        on_delta: F,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError>
    where
        F: FnMut(&str) -> anyhow::Result<()> + Send,
    {
        let transcript = to_transcript(messages)?;
        let request = build_request(&self.config, transcript, None, true);
        let deadline = self.config.stream_timeout();

        let work = async {
            let stream = self.backend.complete_stream(request).await?;
            drain_deltas(stream, on_delta).await.map_err(AgentError::from)
        };

        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(deadline, work) => match result {
                Ok(content) => content?,
                Err(_) => {
                    return Err(InferenceError::Timeout {
                        duration_ms: deadline.as_millis() as u64,
                    }
                    .into())
                }
            },
        };

        Ok(ChatResponse::completed(content, "stop".into(), Default::default()))
    }

    /// Streamed turn inside a session.
    ///
    /// History handling matches [`chat_with_session`](Self::chat_with_session);
    /// the concatenated fragments are saved as one assistant message once the
    /// stream ends.
    pub async fn chat_stream_with_session<F>(
        &self,
        session_id: &str,
        system_prompt: &str,
        text: &str,
        on_delta: F,
    ) -> Result<ChatResponse, AgentError>
    where
        F: FnMut(&str) -> anyhow::Result<()> + Send,
    {
        self.chat_stream_with_session_cancellable(
            session_id,
            system_prompt,
            text,
            on_delta,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn chat_stream_with_session_cancellable<F>(
        &self,
        session_id: &str,
        system_prompt: &str,
        text: &str,
        on_delta: F,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError>
    where
        F: FnMut(&str) -> anyhow::Result<()> + Send,
    {
        let Some(store) = self.store.as_deref() else {
            return self
                .chat_stream_cancellable(&seed_turn(system_prompt, text), on_delta, cancel)
                .await;
        };
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        let user = Message::user(text);
        let mut history = self.load_history(store, session_id, system_prompt).await?;
        history.push(user.clone());

        tracing::info!(session_id, history = history.len(), "streamed chat turn");
        let response = self.chat_stream_cancellable(&history, on_delta, cancel).await?;

        persist_exchange(store, session_id, user, response, ReplyPolicy::NonEmpty).await
    }

    // ─── Session passthroughs ───────────────────────────────────────────

    fn require_store(&self) -> Result<&dyn SessionPersistence, AgentError> {
        self.store.as_deref().ok_or_else(|| AgentError::Config {
            reason: "no session store configured".into(),
        })
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<(), AgentError> {
        self.require_store()?.clear_session(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), AgentError> {
        self.require_store()?.delete_session(session_id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, AgentError> {
        self.require_store()?.list_sessions().await
    }

    pub async fn get_session_info(&self, session_id: &str) -> Result<SessionInfo, AgentError> {
        self.require_store()?.get_session_info(session_id).await
    }

    pub async fn get_session_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        self.require_store()?.load_messages(session_id).await
    }

    // ─── Tool queries ───────────────────────────────────────────────────

    /// Names of the provider's tools; empty when no provider is attached.
    pub fn get_available_tools(&self) -> Result<Vec<String>, AgentError> {
        match &self.tools {
            None => Ok(Vec::new()),
            Some(manager) if !manager.is_connected() => {
                Err(McpError::not_connected(&manager.config().url).into())
            }
            Some(manager) => Ok(manager.get_tool_names()),
        }
    }

    /// The provider's catalog in function-calling form; empty when no
    /// provider is attached.
    pub fn get_tool_definitions(&self) -> Result<Vec<ToolDefinition>, AgentError> {
        match &self.tools {
            None => Ok(Vec::new()),
            Some(manager) => Ok(manager.get_tools()?),
        }
    }

    pub fn get_tool_info(&self, name: &str) -> Result<ToolDescriptor, AgentError> {
        let manager = self.tools.as_ref().ok_or_else(|| AgentError::Config {
            reason: "no tool provider configured".into(),
        })?;
        Ok(manager.get_tool_info(name)?)
    }

    // ─── Internals ──────────────────────────────────────────────────────

    /// Run one backend call under the request deadline and `cancel`.
    pub(super) async fn complete_request(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion, AgentError> {
        let deadline = self.config.request_timeout();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(deadline, self.backend.complete(request)) => result,
        };

        match result {
            Ok(Ok(completion)) => Ok(completion),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, transient = e.is_transient(), "completion request failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(timeout_ms = deadline.as_millis() as u64, "completion request timed out");
                Err(InferenceError::Timeout {
                    duration_ms: deadline.as_millis() as u64,
                }
                .into())
            }
        }
    }

    /// Session history, seeding and saving the system prompt into an empty session.
    async fn load_history(
        &self,
        store: &dyn SessionPersistence,
        session_id: &str,
        system_prompt: &str,
    ) -> Result<Vec<Message>, AgentError> {
        let mut history = store.load_messages(session_id).await?;
        if history.is_empty() && !system_prompt.is_empty() {
            let system = Message::system(system_prompt);
            store.save_message(session_id, system.clone()).await?;
            history.push(system);
        }
        Ok(history)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn to_transcript(messages: &[Message]) -> Result<Vec<ChatMessage>, AgentError> {
    if messages.is_empty() {
        return Err(AgentError::Validation {
            reason: "transcript must contain at least one message".into(),
        });
    }
    Ok(messages.iter().map(ChatMessage::from).collect())
}

/// `[system?, user]` for a stateless turn.
fn seed_turn(system_prompt: &str, text: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if !system_prompt.is_empty() {
        messages.push(Message::system(system_prompt));
    }
    messages.push(Message::user(text));
    messages
}

/// Which assistant replies get saved after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyPolicy {
    /// Every reply, so user and assistant messages keep alternating.
    Always,
    /// Only replies with text; an empty stream leaves no assistant message.
    NonEmpty,
}

/// Save the user message and the answer. A failure keeps the answer inside
/// `AgentError::Persistence`.
async fn persist_exchange(
    store: &dyn SessionPersistence,
    session_id: &str,
    user: Message,
    response: ChatResponse,
    policy: ReplyPolicy,
) -> Result<ChatResponse, AgentError> {
    let save_reply = policy == ReplyPolicy::Always || !response.content.is_empty();
    let mut result = store.save_message(session_id, user).await;
    if result.is_ok() && save_reply {
        result = store
            .save_message(session_id, Message::assistant(response.content.clone()))
            .await;
    }

    match result {
        Ok(()) => Ok(response),
        Err(e) => {
            tracing::error!(session_id, error = %e, "failed to persist chat turn");
            Err(AgentError::Persistence {
                session_id: session_id.to_string(),
                reason: e.to_string(),
                response: Box::new(response),
            })
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
