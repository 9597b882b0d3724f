//! Scripted fakes shared by the unit tests.
//!
//! - `ScriptedBackend`: returns queued completions / delta streams in order
//! - `FakeConnector`: hands out queued transports and records open times
//! - `FakeTransport`: in-memory tool provider with per-tool behaviors

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;

use crate::inference::backend::{CompletionBackend, DeltaStream};
use crate::inference::errors::InferenceError;
use crate::inference::types::{
    ChatCompletionRequest, Completion, CompletionChoice, ToolCallRequest, Usage,
};
use crate::mcp_client::errors::McpError;
use crate::mcp_client::transport::{ToolTransport, TransportConnector};
use crate::mcp_client::types::{
    ClientInfo, ContentItem, InitializeResult, ServerInfo, ToolArguments, ToolDescriptor,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub(crate) fn weather_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "weather".into(),
        description: "Current weather for a city".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
    }
}

pub(crate) fn usage() -> Usage {
    Usage {
        prompt_tokens: 12,
        completion_tokens: 8,
        total_tokens: 20,
    }
}

pub(crate) fn text_completion(content: &str) -> Completion {
    Completion::single(
        CompletionChoice {
            content: content.to_string(),
            finish_reason: "stop".into(),
            tool_calls: Vec::new(),
        },
        usage(),
    )
}

pub(crate) fn tool_call_completion(calls: Vec<ToolCallRequest>) -> Completion {
    Completion::single(
        CompletionChoice {
            content: String::new(),
            finish_reason: "tool_calls".into(),
            tool_calls: calls,
        },
        usage(),
    )
}

// ─── ScriptedBackend ─────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    completions: Mutex<VecDeque<Result<Completion, InferenceError>>>,
    /// Returned once the queue is empty, forever.
    fallback: Mutex<Option<Completion>>,
    streams: Mutex<VecDeque<Vec<Result<String, InferenceError>>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    hang: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, result: Result<Completion, InferenceError>) {
        self.completions.lock().unwrap().push_back(result);
    }

    pub fn push_text(&self, content: &str) {
        self.push(Ok(text_completion(content)));
    }

    pub fn push_tool_calls(&self, calls: Vec<ToolCallRequest>) {
        self.push(Ok(tool_call_completion(calls)));
    }

    pub fn repeat(&self, completion: Completion) {
        *self.fallback.lock().unwrap() = Some(completion);
    }

    pub fn push_stream(&self, deltas: Vec<Result<&str, InferenceError>>) {
        let deltas = deltas.into_iter().map(|d| d.map(str::to_string)).collect();
        self.streams.lock().unwrap().push_back(deltas);
    }

    /// Every later call never completes.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion, InferenceError> {
        self.requests.lock().unwrap().push(request);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.completions.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self.fallback.lock().unwrap().clone().ok_or(InferenceError::Backend {
                reason: "no scripted completion left".into(),
            }),
        }
    }

    async fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<DeltaStream, InferenceError> {
        self.requests.lock().unwrap().push(request);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let deltas = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(InferenceError::Backend {
                reason: "no scripted stream left".into(),
            })?;
        Ok(futures::stream::iter(deltas).boxed())
    }
}

// ─── FakeTransport ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) enum ToolBehavior {
    Text(String),
    Fail(String),
    NoText,
    Hang,
}

pub(crate) struct FakeTransport {
    server_name: String,
    tools: Vec<ToolDescriptor>,
    behaviors: Mutex<HashMap<String, ToolBehavior>>,
    calls: Mutex<Vec<(String, ToolArguments)>>,
    initialized_with: Mutex<Option<ClientInfo>>,
    hang_on_start: AtomicBool,
    fail_pings: AtomicBool,
    fail_close: AtomicBool,
    pings: AtomicUsize,
    closed: AtomicBool,
}

impl FakeTransport {
    pub fn new(server_name: &str, tools: Vec<ToolDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            server_name: server_name.to_string(),
            tools,
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            initialized_with: Mutex::new(None),
            hang_on_start: AtomicBool::new(false),
            fail_pings: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_tool(self: Arc<Self>, name: &str, behavior: ToolBehavior) -> Arc<Self> {
        self.set_tool(name, behavior);
        self
    }

    pub fn set_tool(&self, name: &str, behavior: ToolBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(name.to_string(), behavior);
    }

    pub fn hang_on_start(self: Arc<Self>) -> Arc<Self> {
        self.hang_on_start.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, ToolArguments)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn initialized_with(&self) -> Option<ClientInfo> {
        self.initialized_with.lock().unwrap().clone()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for FakeTransport {
    async fn start(&self) -> Result<(), McpError> {
        if self.hang_on_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn initialize(&self, client: &ClientInfo) -> Result<InitializeResult, McpError> {
        *self.initialized_with.lock().unwrap() = Some(client.clone());
        Ok(InitializeResult {
            protocol_version: Some("2024-11-05".into()),
            capabilities: serde_json::json!({"tools": {}}),
            server_info: ServerInfo {
                name: Some(self.server_name.clone()),
                version: Some("0.1.0".into()),
            },
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<Vec<ContentItem>, McpError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolBehavior::Text(format!("{name} ok")));
        match behavior {
            ToolBehavior::Text(text) => Ok(vec![ContentItem::text(text)]),
            ToolBehavior::Fail(reason) => Err(McpError::Transport { reason }),
            ToolBehavior::NoText => Ok(vec![ContentItem::Other]),
            ToolBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }

    async fn ping(&self) -> Result<(), McpError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(McpError::Transport {
                reason: "ping: connection reset".into(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(McpError::Transport {
                reason: "close: broken pipe".into(),
            });
        }
        Ok(())
    }
}

// ─── FakeConnector ───────────────────────────────────────────────────────────

pub(crate) enum OpenOutcome {
    Ready(Arc<FakeTransport>),
    Fail(String),
    Hang,
}

/// Hands out scripted outcomes in order; once exhausted every open is refused.
pub(crate) struct FakeConnector {
    script: Mutex<VecDeque<OpenOutcome>>,
    opens: Mutex<Vec<Instant>>,
}

impl FakeConnector {
    pub fn new(script: Vec<OpenOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opens: Mutex::new(Vec::new()),
        })
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn open(&self, url: &str) -> Result<Arc<dyn ToolTransport>, McpError> {
        self.opens.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(OpenOutcome::Ready(transport)) => Ok(transport),
            Some(OpenOutcome::Fail(reason)) => Err(McpError::Connection {
                url: url.to_string(),
                reason,
            }),
            Some(OpenOutcome::Hang) => {
                std::future::pending::<()>().await;
                Err(McpError::Connection {
                    url: url.to_string(),
                    reason: "unreachable".into(),
                })
            }
            None => Err(McpError::Connection {
                url: url.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}
