//! # JSON-RPC Server Prelude
//!
//! ```rust
//! use debugger_mcp_json_rpc_server::prelude::*;
//! ```

pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::notification::JsonRpcNotification;
pub use crate::r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use crate::types::{JsonRpcVersion, RequestId};

// Standard error codes
pub use crate::error_codes::*;
