//! Agent Core: conversation orchestration.
//!
//! Submodules:
//! - `orchestrator`: Chat entry points, session seeding and persistence
//! - `tool_loop`: Bounded tool-call rounds against the tool provider
//! - `session_store`: Bounded per-session message memory
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod errors;
pub mod orchestrator;
pub mod session_store;
mod tool_loop;
pub mod types;

// Re-exports for convenience
pub use errors::AgentError;
pub use orchestrator::ChatOrchestrator;
pub use session_store::{MemorySessionStore, SessionPersistence, DEFAULT_MAX_MESSAGES};
pub use types::{session_key, ChatResponse, SessionInfo, TurnOutcome};
