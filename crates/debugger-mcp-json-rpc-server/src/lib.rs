//! # JSON-RPC 2.0 Server Implementation
//!
//! Transport-agnostic JSON-RPC 2.0 handling for the debugger MCP bridge.
//! This crate turns raw request bodies into classified envelopes, routes them
//! to registered handlers and builds protocol-correct responses. It contains
//! no transport code.
//!
//! ## Guarantees
//! - Requests (non-null `id`) get exactly one response echoing the id
//! - Notifications (absent or null `id`) never get a response
//! - Unparseable bodies get a Parse Error with `id: null`
//! - Handler errors and panics become error envelopes

pub mod dispatch;
pub mod error;
pub mod notification;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

pub mod r#async;

// Re-export main types
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
