//! Session memory: bounded per-session message logs.
//!
//! Responsibilities:
//! - Append messages per session, creating entries lazily
//! - Enforce the per-session capacity, never evicting a leading system message
//! - Track session metadata (timestamps, count, first-message preview)
//!
//! `SessionPersistence` is the seam the orchestrator talks to;
//! `MemorySessionStore` is the in-process implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::inference::types::{Message, Role};

use super::errors::AgentError;
use super::types::SessionInfo;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Capacity applied when the configured maximum is 0.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// Characters kept in the first-message preview before `...` is appended.
const PREVIEW_CHARS: usize = 50;

// ─── SessionPersistence ─────────────────────────────────────────────────────

/// Storage for per-session conversation history.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Append a message, evicting old ones past capacity.
    async fn save_message(&self, session_id: &str, message: Message) -> Result<(), AgentError>;

    /// Independent copy of the session's messages; unknown or empty ids
    /// yield an empty vector.
    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError>;

    /// Empty the log but keep the session and its creation time.
    async fn clear_session(&self, session_id: &str) -> Result<(), AgentError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), AgentError>;

    /// All known session ids, sorted.
    async fn list_sessions(&self) -> Result<Vec<String>, AgentError>;

    async fn get_session_info(&self, session_id: &str) -> Result<SessionInfo, AgentError>;
}

// ─── MemorySessionStore ─────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionEntry {
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    first_message: Option<String>,
}

impl SessionEntry {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            first_message: None,
        }
    }

    fn info(&self, session_id: &str) -> SessionInfo {
        SessionInfo {
            session_id: session_id.to_string(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            first_message: self.first_message.clone(),
        }
    }
}

/// In-memory session store guarded by one store-wide lock.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_messages: usize,
}

impl MemorySessionStore {
    /// Create a store holding at most `max_messages` per session (0 → 100).
    pub fn new(max_messages: usize) -> Self {
        let max_messages = if max_messages == 0 {
            DEFAULT_MAX_MESSAGES
        } else {
            max_messages
        };
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_messages
    }

    /// Number of messages in a session; 0 for unknown ids.
    pub async fn message_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.messages.len())
            .unwrap_or(0)
    }

    /// Metadata for every session, sorted by id.
    pub async fn all_session_infos(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<SessionInfo> = sessions.iter().map(|(id, e)| e.info(id)).collect();
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

#[async_trait]
impl SessionPersistence for MemorySessionStore {
    async fn save_message(&self, session_id: &str, message: Message) -> Result<(), AgentError> {
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::new);

        entry.messages.push(message);
        let evicted = enforce_capacity(&mut entry.messages, self.max_messages);
        entry.updated_at = Utc::now();
        if entry.first_message.is_none() {
            entry.first_message = first_message_preview(&entry.messages);
        }

        if evicted > 0 {
            tracing::debug!(session_id, evicted, retained = entry.messages.len(), "evicted old messages");
        }
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        if session_id.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(entry) = self.sessions.read().await.get(session_id) {
            return Ok(entry.messages.clone());
        }

        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::new);
        Ok(Vec::new())
    }

    async fn clear_session(&self, session_id: &str) -> Result<(), AgentError> {
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        if let Some(entry) = self.sessions.write().await.get_mut(session_id) {
            entry.messages.clear();
            entry.first_message = None;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AgentError> {
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, AgentError> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_session_info(&self, session_id: &str) -> Result<SessionInfo, AgentError> {
        if session_id.is_empty() {
            return Err(AgentError::empty_session_id());
        }

        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.info(session_id))
            .ok_or_else(|| AgentError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}

// ─── Eviction ───────────────────────────────────────────────────────────────

/// Trim `messages` to `cap`, returning how many were dropped.
///
/// A leading system message always survives; the rest of the budget goes to
/// the most recent messages. With `cap == 1` only the system message remains.
fn enforce_capacity(messages: &mut Vec<Message>, cap: usize) -> usize {
    if messages.len() <= cap {
        return 0;
    }

    let before = messages.len();
    if messages[0].role == Role::System {
        let keep_recent = cap.saturating_sub(1);
        let tail_start = messages.len() - keep_recent;
        messages.drain(1..tail_start);
    } else {
        let excess = messages.len() - cap;
        messages.drain(..excess);
    }
    before - messages.len()
}

fn first_message_preview(messages: &[Message]) -> Option<String> {
    let first = messages.iter().find(|m| m.role != Role::System)?;
    let mut chars = first.content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        Some(format!("{head}..."))
    } else {
        Some(head)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
