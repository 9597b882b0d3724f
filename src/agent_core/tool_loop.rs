//! Bounded tool-call loop.
//!
//! Sends the transcript plus catalog, executes any requested tool calls,
//! appends their results and resubmits, at most `max_tool_calls` rounds.
//! Invocation failures are fed back to the model as text; only malformed
//! arguments, backend errors and cancellation end the turn with an error.

use tokio_util::sync::CancellationToken;

use crate::inference::backend::build_request;
use crate::inference::types::{ChatMessage, ToolCallRequest, ToolDefinition};
use crate::mcp_client::manager::ToolProviderManager;

use super::errors::AgentError;
use super::orchestrator::ChatOrchestrator;
use super::types::{ChatResponse, TurnOutcome};

impl ChatOrchestrator {
    pub(super) async fn run_tool_loop(
        &self,
        manager: &ToolProviderManager,
        tools: Vec<ToolDefinition>,
        mut transcript: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let max_rounds = manager.config().effective_max_tool_calls();
        let tools = (!tools.is_empty()).then_some(tools);
        let mut round: u32 = 0;

        loop {
            let request = build_request(
                self.completion_config(),
                transcript.clone(),
                tools.clone(),
                false,
            );
            let (choice, usage) = self
                .complete_request(request, cancel)
                .await?
                .into_first_choice()?;

            if choice.tool_calls.is_empty() {
                tracing::debug!(rounds = round, "tool loop finished");
                return Ok(ChatResponse {
                    content: choice.content,
                    finish_reason: choice.finish_reason,
                    usage,
                    tool_rounds: round,
                    outcome: TurnOutcome::Completed,
                });
            }

            if round >= max_rounds {
                tracing::warn!(
                    max_rounds,
                    pending_calls = choice.tool_calls.len(),
                    "tool call round limit reached, returning last response"
                );
                return Ok(ChatResponse {
                    content: choice.content,
                    finish_reason: choice.finish_reason,
                    usage,
                    tool_rounds: round,
                    outcome: TurnOutcome::RoundLimitReached,
                });
            }

            let calls: Vec<ToolCallRequest> = choice
                .tool_calls
                .into_iter()
                .map(with_call_id)
                .collect();

            tracing::info!(round = round + 1, calls = calls.len(), "executing tool calls");

            transcript.push(ChatMessage::Assistant {
                content: choice.content,
                tool_calls: calls.clone(),
            });

            for call in &calls {
                let result = self.execute_call(manager, call, cancel).await?;
                transcript.push(ChatMessage::tool_result(call.id.clone(), result));
            }

            round += 1;
        }
    }

    /// Run one tool call. `Err` only for malformed arguments or cancellation;
    /// invocation failures come back as the result text.
    async fn execute_call(
        &self,
        manager: &ToolProviderManager,
        call: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let arguments = call
            .parse_arguments()
            .map_err(|e| AgentError::InvalidArgument {
                reason: format!("tool call '{}' has malformed arguments: {e}", call.name),
            })?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            outcome = manager.invoke(&call.name, &arguments, None) => outcome,
        };

        Ok(match outcome {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                format!("tool call failed: {e}")
            }
        })
    }
}

/// Backends may omit the id; results must still be keyed to their call.
fn with_call_id(mut call: ToolCallRequest) -> ToolCallRequest {
    if call.id.is_empty() {
        call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
    }
    call
}
