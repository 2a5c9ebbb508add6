//! Listener lifecycle: start, stop, restart and status

use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use debugger_http_mcp_server::{HttpMcpError, HttpMcpServer, ServerConfig, SessionRegistry};

use crate::McpEngine;
use crate::engine::ClientInfo;

/// Last failure recorded by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastError {
    /// The port was taken; pick another and start again
    PortInUse { port: u16 },
    Fatal { message: String },
}

impl LastError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LastError::PortInUse { .. })
    }
}

impl std::fmt::Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LastError::PortInUse { port } => write!(f, "Port {} is already in use", port),
            LastError::Fatal { message } => f.write_str(message),
        }
    }
}

/// Snapshot of the listener for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRuntimeState {
    /// Bound port while running, otherwise the last port attempted
    pub port: Option<u16>,
    pub running: bool,
    pub last_error: Option<LastError>,
    pub started_at: Option<DateTime<Utc>>,
    pub active_sessions: usize,
    pub client: Option<ClientInfo>,
    pub client_initialized: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("Failed to start listener on port {port}: {source}")]
    Start {
        port: u16,
        #[source]
        source: HttpMcpError,
    },

    #[error("Server is already running on port {port}")]
    AlreadyRunning { port: u16 },
}

#[derive(Debug, Default)]
struct RecordedState {
    port: Option<u16>,
    running: bool,
    last_error: Option<LastError>,
    started_at: Option<DateTime<Utc>>,
}

struct RunningListener {
    port: u16,
    shutdown: CancellationToken,
    task: JoinHandle<debugger_http_mcp_server::Result<()>>,
}

/// Owns the HTTP listener and the process-wide runtime state
///
/// Only this type mutates the runtime state; [`status`](Self::status) reads
/// it. Start and stop are serialized.
pub struct ServerLifecycle {
    engine: McpEngine,
    config: ServerConfig,
    sessions: SessionRegistry,
    state: RwLock<RecordedState>,
    listener: Mutex<Option<RunningListener>>,
}

impl ServerLifecycle {
    pub fn new(engine: McpEngine, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            sessions: SessionRegistry::new(),
            state: RwLock::new(RecordedState::default()),
            listener: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &McpEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Port from the transport configuration
    pub fn configured_port(&self) -> u16 {
        self.config.bind_address.port()
    }

    /// Bind and start serving on `port` (0 picks a free port).
    ///
    /// Returns the bound port. A port already in use is recorded as a
    /// recoverable error; any other failure is recorded as fatal. Neither
    /// leaves anything running.
    pub async fn start(&self, port: u16) -> Result<u16, LifecycleError> {
        let mut listener_slot = self.listener.lock().await;
        if let Some(running) = listener_slot.as_ref() {
            return Err(LifecycleError::AlreadyRunning { port: running.port });
        }

        let mut config = self.config.clone();
        config.bind_address.set_port(port);
        let server = HttpMcpServer::builder()
            .config(config)
            .sessions(self.sessions.clone())
            .dispatcher(self.engine.build_dispatcher())
            .build();

        let bound = match server.bind().await {
            Ok(listener) => listener
                .local_addr()
                .map(|addr| (listener, addr.port()))
                .map_err(HttpMcpError::from),
            Err(err) => Err(err),
        };
        let (listener, bound_port) = match bound {
            Ok(bound) => bound,
            Err(err) if err.io_kind() == Some(ErrorKind::AddrInUse) => {
                warn!(port, "Port already in use");
                self.record_failure(port, LastError::PortInUse { port });
                return Err(LifecycleError::PortInUse { port });
            }
            Err(err) => {
                error!(port, error = %err, "Failed to start listener");
                self.record_failure(
                    port,
                    LastError::Fatal {
                        message: err.to_string(),
                    },
                );
                return Err(LifecycleError::Start { port, source: err });
            }
        };

        let shutdown = CancellationToken::new();
        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { server.serve(listener, shutdown).await })
        };

        {
            let mut state = self.state.write();
            state.port = Some(bound_port);
            state.running = true;
            state.last_error = None;
            state.started_at = Some(Utc::now());
        }
        info!(port = bound_port, "MCP server started");

        *listener_slot = Some(RunningListener {
            port: bound_port,
            shutdown,
            task,
        });
        Ok(bound_port)
    }

    /// Stop accepting, end all SSE sessions and wait for the drain. Idempotent.
    pub async fn stop(&self) {
        let mut listener_slot = self.listener.lock().await;
        let Some(running) = listener_slot.take() else {
            debug!("Stop requested but server is not running");
            return;
        };

        running.shutdown.cancel();
        let failure = match running.task.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(join_error) => Some(format!("Listener task failed: {}", join_error)),
        };

        let mut state = self.state.write();
        state.running = false;
        state.started_at = None;
        if let Some(message) = failure {
            error!(port = running.port, error = %message, "Listener stopped with error");
            state.last_error = Some(LastError::Fatal { message });
        }
        info!(port = running.port, "MCP server stopped");
    }

    /// Stop, then start on `new_port`.
    pub async fn restart(&self, new_port: u16) -> Result<u16, LifecycleError> {
        info!(port = new_port, "Restarting MCP server");
        self.stop().await;
        self.start(new_port).await
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    pub fn status(&self) -> ServerRuntimeState {
        let state = self.state.read();
        ServerRuntimeState {
            port: state.port,
            running: state.running,
            last_error: state.last_error.clone(),
            started_at: state.started_at,
            active_sessions: self.sessions.len(),
            client: self.engine.client().info(),
            client_initialized: self.engine.client().is_initialized(),
        }
    }

    fn record_failure(&self, port: u16, error: LastError) {
        let mut state = self.state.write();
        state.port = Some(port);
        state.running = false;
        state.started_at = None;
        state.last_error = Some(error);
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        if let Some(running) = self.listener.get_mut().as_ref() {
            running.shutdown.cancel();
        }
    }
}
