//! Shared types for the agent core.
//!
//! Session metadata and the response produced by one chat turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::types::Usage;

// ─── Sessions ───────────────────────────────────────────────────────────────

/// Metadata for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// First non-system message, truncated to 50 characters plus `...`.
    pub first_message: Option<String>,
}

/// Composite session key for a user inside a group.
///
/// Distinct `(group, user)` pairs always map to distinct keys.
pub fn session_key(group_id: &str, user_id: &str) -> String {
    format!("{group_id}:{user_id}")
}

// ─── Chat turns ─────────────────────────────────────────────────────────────

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The model produced a final answer.
    Completed,
    /// The tool-call round budget ran out; `content` is the last response as-is.
    RoundLimitReached,
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: String,
    /// Usage reported for the last completion of the turn.
    pub usage: Usage,
    /// Number of tool-call rounds executed.
    pub tool_rounds: u32,
    pub outcome: TurnOutcome,
}

impl ChatResponse {
    pub(crate) fn completed(content: String, finish_reason: String, usage: Usage) -> Self {
        Self {
            content,
            finish_reason,
            usage,
            tool_rounds: 0,
            outcome: TurnOutcome::Completed,
        }
    }
}
