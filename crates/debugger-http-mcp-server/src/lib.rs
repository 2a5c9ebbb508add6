//! # HTTP MCP Server
//!
//! HTTP transport for the debugger MCP bridge. One listener serves both
//! MCP transports on the same endpoint set:
//!
//! ## Supported Transports
//! - **Streamable HTTP**: `POST` returns the JSON-RPC response as the body
//! - **HTTP+SSE**: `GET` opens an event stream; `POST ?sessionId=..` is
//!   answered with 202 and the response is pushed on the stream
//!
//! Every response carries permissive CORS headers.

pub mod cors;
pub mod handler;
pub mod server;
pub mod session;
pub mod sse;

#[cfg(test)]
mod tests;

// Re-export main types
pub use cors::CorsLayer;
pub use handler::{McpBody, McpTransportHandler};
pub use server::{HttpMcpServer, HttpMcpServerBuilder, ServerConfig};
pub use session::{
    Session, SessionInfo, SessionReceiver, SessionRegistry, SessionSender, SessionState,
};
pub use sse::format_sse_frame;

/// Result type for HTTP MCP operations
pub type Result<T> = std::result::Result<T, HttpMcpError>;

/// HTTP MCP specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HttpMcpError {
    /// The underlying IO error kind, if this is an IO failure
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            HttpMcpError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}
