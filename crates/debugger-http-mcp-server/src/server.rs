//! HTTP MCP server: configuration, accept loop and graceful drain

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use debugger_mcp_json_rpc_server::{JsonRpcDispatcher, JsonRpcHandler};
use debugger_mcp_protocol::McpError;

use crate::{McpTransportHandler, Result, SessionRegistry};

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Configuration for the HTTP MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Primary MCP endpoint path
    pub mcp_path: String,
    /// Alias endpoint path for legacy SSE clients
    pub sse_path: String,
    /// Query parameter carrying the SSE session id on POST
    pub session_query_param: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Seconds between keep-alive comments on idle SSE streams
    pub keepalive_interval_secs: u64,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            mcp_path: "/mcp".to_string(),
            sse_path: "/sse".to_string(),
            session_query_param: "sessionId".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            keepalive_interval_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Builder for the HTTP MCP server
pub struct HttpMcpServerBuilder {
    config: ServerConfig,
    dispatcher: JsonRpcDispatcher<McpError>,
    sessions: SessionRegistry,
}

impl HttpMcpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            dispatcher: JsonRpcDispatcher::new(),
            sessions: SessionRegistry::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the MCP endpoint path
    pub fn mcp_path(mut self, path: impl Into<String>) -> Self {
        self.config.mcp_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Share an existing session registry (e.g. for status reporting)
    pub fn sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }

    /// Register a JSON-RPC handler for specific methods
    pub fn register_handler<H>(mut self, methods: Vec<String>, handler: H) -> Self
    where
        H: JsonRpcHandler<Error = McpError> + 'static,
    {
        self.dispatcher.register_methods(methods, handler);
        self
    }

    /// Use a fully assembled dispatcher
    pub fn dispatcher(mut self, dispatcher: JsonRpcDispatcher<McpError>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn build(self) -> HttpMcpServer {
        let config = Arc::new(self.config);
        let handler =
            McpTransportHandler::new(Arc::clone(&config), Arc::new(self.dispatcher), self.sessions);
        HttpMcpServer { config, handler }
    }
}

impl Default for HttpMcpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP MCP server serving both transports on one listener
#[derive(Clone)]
pub struct HttpMcpServer {
    config: Arc<ServerConfig>,
    handler: McpTransportHandler,
}

impl HttpMcpServer {
    pub fn builder() -> HttpMcpServerBuilder {
        HttpMcpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        self.handler.sessions()
    }

    pub fn handler(&self) -> &McpTransportHandler {
        &self.handler
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_address).await?)
    }

    /// Bind and serve until the process ends.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, CancellationToken::new()).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled, then
    /// drain: stop accepting, end every SSE stream and wait for open
    /// connections up to the configured timeout.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("HTTP MCP server listening on {}", local_addr);
        info!(
            "MCP endpoint available at: {} (SSE alias {})",
            self.config.mcp_path, self.config.sse_path
        );

        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            // EMFILE and friends persist until a connection closes
                            warn!("Failed to accept connection: {}", err);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    debug!("New connection from {}", peer_addr);

                    let handler = self.handler.clone();
                    let service = service_fn(move |req| {
                        let handler = handler.clone();
                        async move { Ok::<_, Infallible>(handler.handle_request(req).await) }
                    });
                    let connection = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service);
                    let connection = graceful.watch(connection);

                    tokio::spawn(async move {
                        if let Err(err) = connection.await {
                            debug!("Connection from {} ended with error: {}", peer_addr, err);
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let closed = self.sessions().close_all();
        debug!(closed, "Closed SSE sessions");

        tokio::select! {
            _ = graceful.shutdown() => info!("All connections drained"),
            _ = tokio::time::sleep(self.config.shutdown_timeout()) => {
                warn!(
                    "Timed out after {:?} waiting for connections to drain",
                    self.config.shutdown_timeout()
                );
            }
        }
        Ok(())
    }
}
