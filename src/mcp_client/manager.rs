//! Tool provider connection manager.
//!
//! Owns the single connection to an external tool provider:
//! - connect / handshake / catalog load under one connect deadline
//! - tool invocation with per-call deadlines and schema checks
//! - a background health task that pings and, on failure, reconnects with a
//!   bounded number of delayed attempts
//!
//! State transitions are published on a `watch` channel:
//! `Disconnected → Connecting → Connected → Reconnecting → {Connected | Disconnected}`.
//! A failed `Connecting` falls back to `Disconnected`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::inference::types::ToolDefinition;

use super::config::ToolProviderConfig;
use super::errors::McpError;
use super::registry::ToolCatalog;
use super::transport::{ToolTransport, TransportConnector};
use super::types::{first_text, ConnectionState, ServerInfo, ToolArguments, ToolDescriptor};

// ─── Internal state ──────────────────────────────────────────────────────────

/// Everything produced by one successful handshake.
struct ProviderSession {
    transport: Arc<dyn ToolTransport>,
    server: ServerInfo,
    catalog: Arc<ToolCatalog>,
    last_ping: DateTime<Utc>,
}

struct HealthTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    config: ToolProviderConfig,
    connector: Arc<dyn TransportConnector>,
    state_tx: watch::Sender<ConnectionState>,
    /// Held only for reads and writes of the slot, never across I/O.
    session: RwLock<Option<ProviderSession>>,
    health: Mutex<Option<HealthTask>>,
    /// Serializes `connect` so only one handshake installs a session at a time.
    connect_lock: tokio::sync::Mutex<()>,
}

/// How a reconnect cycle ended.
enum ReconnectOutcome {
    Reconnected,
    Exhausted,
    Cancelled,
}

// ─── ToolProviderManager ─────────────────────────────────────────────────────

/// Manages the lifecycle of one tool provider connection.
///
/// Create once, call [`connect`](Self::connect), share behind an `Arc`.
/// Dropping the manager cancels the health task.
pub struct ToolProviderManager {
    inner: Arc<Inner>,
}

impl ToolProviderManager {
    pub fn new(config: ToolProviderConfig, connector: Arc<dyn TransportConnector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                state_tx,
                session: RwLock::new(None),
                health: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &ToolProviderConfig {
        &self.inner.config
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Connect, perform the handshake, and load the tool catalog.
    ///
    /// Any existing connection is torn down first. The whole sequence is
    /// bounded by `connect_timeout`; exceeding it yields `Connection`.
    /// Concurrent calls run one after another.
    pub async fn connect(&self) -> Result<(), McpError> {
        self.inner.config.validate()?;
        let _connecting = self.inner.connect_lock.lock().await;

        if self.connection_state() != ConnectionState::Disconnected || self.inner.has_session() {
            if let Err(e) = self.disconnect().await {
                tracing::debug!(error = %e, "error closing previous tool transport");
            }
        }

        self.inner.set_state(ConnectionState::Connecting);

        let session = match self.inner.establish().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(url = %self.inner.config.url, error = %e, "tool provider connect failed");
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.inner.install(session);
        self.inner.set_state(ConnectionState::Connected);

        if self.inner.config.health_check_enabled() {
            self.start_health_task();
        }
        Ok(())
    }

    /// Stop the health task, close the transport, and mark `Disconnected`.
    ///
    /// Safe to call in any state, any number of times. The state is
    /// `Disconnected` afterwards even when closing the transport fails; that
    /// error is returned.
    pub async fn disconnect(&self) -> Result<(), McpError> {
        let task = self.inner.lock_health().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "health task ended abnormally");
            }
        }

        let closed = match self.inner.take_session() {
            Some(session) => {
                let closed = session.transport.close().await;
                if self.inner.config.enable_logging {
                    tracing::info!(url = %self.inner.config.url, "disconnected from tool provider");
                }
                closed
            }
            None => Ok(()),
        };

        self.inner.set_state(ConnectionState::Disconnected);
        closed
    }

    fn start_health_task(&self) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(health_loop(Arc::clone(&self.inner), cancel.clone()));
        let previous = self.inner.lock_health().replace(HealthTask { cancel, handle });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    // ─── State ───────────────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Receive every state transition from now on.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Time of the last successful handshake or ping.
    pub fn last_ping_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read_session().as_ref().map(|s| s.last_ping)
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.read_session().as_ref().map(|s| s.server.clone())
    }

    // ─── Tools ───────────────────────────────────────────────────────────

    /// The catalog in the backend's function-calling format.
    pub fn get_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let (_, catalog) = self.inner.connected_session()?;
        Ok(catalog.to_definitions())
    }

    /// Names of the cached tools, empty when nothing has been loaded.
    pub fn get_tool_names(&self) -> Vec<String> {
        self.inner
            .read_session()
            .as_ref()
            .map(|s| s.catalog.names())
            .unwrap_or_default()
    }

    pub fn get_tool_info(&self, name: &str) -> Result<ToolDescriptor, McpError> {
        self.inner
            .read_session()
            .as_ref()
            .and_then(|s| s.catalog.get(name).cloned())
            .ok_or_else(|| McpError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Invoke a tool and return its first textual content item.
    ///
    /// `timeout` overrides the configured per-call deadline; `None` or zero
    /// uses `tool_call_timeout`.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: &ToolArguments,
        timeout: Option<Duration>,
    ) -> Result<String, McpError> {
        let (transport, catalog) = self.inner.connected_session()?;
        catalog.validate_arguments(tool_name, arguments)?;

        let deadline = timeout
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| self.inner.config.tool_call_timeout());

        if self.inner.config.log_tool_calls {
            tracing::info!(
                tool = tool_name,
                arguments = %serde_json::Value::Object(arguments.clone()),
                "invoking tool"
            );
        }

        let started = tokio::time::Instant::now();
        let content = tokio::time::timeout(deadline, transport.call_tool(tool_name, arguments))
            .await
            .map_err(|_| McpError::Timeout {
                operation: format!("tool call '{tool_name}'"),
                timeout_ms: deadline.as_millis() as u64,
            })?
            .map_err(|e| match e {
                McpError::ToolInvocation { .. } => e,
                other => McpError::ToolInvocation {
                    tool: tool_name.to_string(),
                    reason: other.to_string(),
                },
            })?;

        tracing::debug!(
            tool = tool_name,
            items = content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call returned"
        );

        first_text(&content)
            .map(str::to_string)
            .ok_or_else(|| McpError::ToolInvocation {
                tool: tool_name.to_string(),
                reason: "result contained no text content".into(),
            })
    }
}

impl Drop for ToolProviderManager {
    fn drop(&mut self) {
        if let Some(task) = self.inner.lock_health().take() {
            task.cancel.cancel();
        }
    }
}

// ─── Inner ───────────────────────────────────────────────────────────────────

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            tracing::debug!(url = %self.config.url, state = %next, "tool provider state changed");
        }
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Option<ProviderSession>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Option<ProviderSession>> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, Option<HealthTask>> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_session(&self) -> bool {
        self.read_session().is_some()
    }

    fn take_session(&self) -> Option<ProviderSession> {
        self.write_session().take()
    }

    fn install(&self, session: ProviderSession) {
        if self.config.enable_logging {
            tracing::info!(
                url = %self.config.url,
                server = session.server.name.as_deref().unwrap_or("<unnamed>"),
                tools = session.catalog.len(),
                "connected to tool provider"
            );
        }
        *self.write_session() = Some(session);
    }

    fn touch_ping(&self) {
        if let Some(session) = self.write_session().as_mut() {
            session.last_ping = Utc::now();
        }
    }

    /// Transport and catalog of a `Connected` session, cloned out of the lock.
    fn connected_session(&self) -> Result<(Arc<dyn ToolTransport>, Arc<ToolCatalog>), McpError> {
        if *self.state_tx.borrow() != ConnectionState::Connected {
            return Err(McpError::not_connected(&self.config.url));
        }
        self.read_session()
            .as_ref()
            .map(|s| (Arc::clone(&s.transport), Arc::clone(&s.catalog)))
            .ok_or_else(|| McpError::not_connected(&self.config.url))
    }

    fn current_transport(&self) -> Option<Arc<dyn ToolTransport>> {
        self.read_session().as_ref().map(|s| Arc::clone(&s.transport))
    }

    /// Run the full connect sequence under `connect_timeout`.
    async fn establish(&self) -> Result<ProviderSession, McpError> {
        let deadline = self.config.connect_timeout();
        match tokio::time::timeout(deadline, self.handshake()).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Connection {
                url: self.config.url.clone(),
                reason: format!("connect timed out after {}ms", deadline.as_millis()),
            }),
        }
    }

    async fn handshake(&self) -> Result<ProviderSession, McpError> {
        let url = &self.config.url;
        let transport = self
            .connector
            .open(url)
            .await
            .map_err(|e| self.as_connection_error(e))?;

        match self.initialize_session(&transport).await {
            Ok((server, catalog)) => Ok(ProviderSession {
                transport,
                server,
                catalog: Arc::new(catalog),
                last_ping: Utc::now(),
            }),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    tracing::debug!(error = %close_err, "error closing transport after failed handshake");
                }
                Err(e)
            }
        }
    }

    async fn initialize_session(
        &self,
        transport: &Arc<dyn ToolTransport>,
    ) -> Result<(ServerInfo, ToolCatalog), McpError> {
        transport
            .start()
            .await
            .map_err(|e| self.as_connection_error(e))?;

        let init = transport
            .initialize(&self.config.client_info())
            .await
            .map_err(|e| match e {
                McpError::Handshake { .. } => e,
                other => McpError::Handshake {
                    reason: other.to_string(),
                },
            })?;

        let expected = self.config.server_name.as_str();
        if !expected.is_empty() {
            let actual = init.server_info.name.as_deref().unwrap_or_default();
            if actual != expected {
                return Err(McpError::Handshake {
                    reason: format!("expected server '{expected}', got '{actual}'"),
                });
            }
        }

        let tools = transport.list_tools().await.map_err(|e| McpError::Connection {
            url: self.config.url.clone(),
            reason: format!("failed to list tools: {e}"),
        })?;

        Ok((init.server_info, ToolCatalog::new(tools)))
    }

    fn as_connection_error(&self, e: McpError) -> McpError {
        match e {
            McpError::Connection { .. } => e,
            other => McpError::Connection {
                url: self.config.url.clone(),
                reason: other.to_string(),
            },
        }
    }

    /// Up to `max_retries` attempts, each preceded by `retry_delay`.
    async fn reconnect(&self, cancel: &CancellationToken) -> ReconnectOutcome {
        let max_retries = self.config.max_retries;
        for attempt in 1..=max_retries {
            tokio::select! {
                _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
                _ = tokio::time::sleep(self.config.retry_delay()) => {}
            }

            if self.config.enable_logging {
                tracing::info!(url = %self.config.url, attempt, max_retries, "reconnecting to tool provider");
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
                result = self.establish() => result,
            };

            match result {
                Ok(session) => {
                    self.install(session);
                    self.set_state(ConnectionState::Connected);
                    return ReconnectOutcome::Reconnected;
                }
                Err(e) => {
                    tracing::warn!(url = %self.config.url, attempt, max_retries, error = %e, "reconnect attempt failed");
                }
            }
        }
        ReconnectOutcome::Exhausted
    }
}

// ─── Health check ────────────────────────────────────────────────────────────

async fn health_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let interval = inner.config.ping_interval();
    let ping_deadline = inner.config.connect_timeout();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(transport) = inner.current_transport() else {
            return;
        };

        let ping = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(ping_deadline, transport.ping()) => result,
        };

        match ping {
            Ok(Ok(())) => {
                inner.touch_ping();
                continue;
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %inner.config.url, error = %e, "health check ping failed");
            }
            Err(_) => {
                tracing::warn!(
                    url = %inner.config.url,
                    timeout_ms = ping_deadline.as_millis() as u64,
                    "health check ping timed out"
                );
            }
        }

        inner.set_state(ConnectionState::Reconnecting);
        if let Some(stale) = inner.take_session() {
            if let Err(e) = stale.transport.close().await {
                tracing::debug!(error = %e, "error closing stale transport");
            }
        }

        match inner.reconnect(&cancel).await {
            ReconnectOutcome::Reconnected => {
                if inner.config.enable_logging {
                    tracing::info!(url = %inner.config.url, "tool provider reconnected");
                }
            }
            ReconnectOutcome::Exhausted => {
                tracing::error!(
                    url = %inner.config.url,
                    max_retries = inner.config.max_retries,
                    "tool provider reconnect attempts exhausted"
                );
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
            ReconnectOutcome::Cancelled => return,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
