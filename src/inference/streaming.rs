//! Delta-stream draining.
//!
//! Pulls content fragments off a [`DeltaStream`], hands each one to a
//! caller-supplied sink as soon as it arrives, and accumulates the full text.

use futures::StreamExt;
use thiserror::Error;

use super::backend::DeltaStream;
use super::errors::InferenceError;

/// Why draining a delta stream stopped early.
#[derive(Debug, Error)]
pub enum DrainError {
    /// The backend stream yielded an error.
    #[error(transparent)]
    Stream(#[from] InferenceError),

    /// The sink refused a fragment; the stream is dropped without reading further.
    #[error("delta sink failed: {0}")]
    Sink(anyhow::Error),
}

/// Forward every fragment to `on_delta` and return the concatenation.
///
/// Empty fragments (keep-alives, role-only deltas) are skipped and never
/// reach the sink.
pub async fn drain_deltas<F>(mut stream: DeltaStream, mut on_delta: F) -> Result<String, DrainError>
where
    F: FnMut(&str) -> anyhow::Result<()> + Send,
{
    let mut full = String::new();
    let mut fragments = 0usize;

    while let Some(item) = stream.next().await {
        let delta = item?;
        if delta.is_empty() {
            continue;
        }
        on_delta(&delta).map_err(DrainError::Sink)?;
        full.push_str(&delta);
        fragments += 1;
    }

    tracing::debug!(fragments, chars = full.chars().count(), "delta stream drained");
    Ok(full)
}
