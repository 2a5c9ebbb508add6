//! Envelope parsing and request/notification classification.

use serde_json::Value;

use crate::{
    error::JsonRpcError,
    notification::JsonRpcNotification,
    request::{JsonRpcRequest, RequestParams},
    types::RequestId,
};

/// An inbound JSON-RPC envelope after classification
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    pub fn method(&self) -> &str {
        match self {
            IncomingMessage::Request(req) => &req.method,
            IncomingMessage::Notification(notif) => &notif.method,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, IncomingMessage::Notification(_))
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            IncomingMessage::Request(req) => Some(&req.id),
            IncomingMessage::Notification(_) => None,
        }
    }
}

/// Why an inbound body could not be turned into a message.
#[derive(Debug, Clone)]
pub enum ParseFailure {
    /// The failure must be answered with this error envelope.
    Reply(JsonRpcError),
    /// The envelope carried no id, so nothing may be sent back.
    Ignore { reason: String },
}

/// Parse a raw body into a JSON-RPC message.
///
/// Unparseable JSON and non-object payloads are answered with an error whose
/// id is `null`. A structurally invalid object is answered with Invalid
/// Request only when it carries a usable id; without one it counts as a
/// notification and is ignored.
pub fn parse_json_rpc_message(body: &[u8]) -> Result<IncomingMessage, ParseFailure> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ParseFailure::Reply(JsonRpcError::parse_error()))?;

    let Value::Object(mut obj) = value else {
        return Err(ParseFailure::Reply(JsonRpcError::invalid_request(None)));
    };

    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(raw) => match RequestId::from_value(raw) {
            Some(id) => Some(id),
            None => return Err(ParseFailure::Reply(JsonRpcError::invalid_request(None))),
        },
    };

    let reject = |reason: &str| match &id {
        Some(id) => ParseFailure::Reply(JsonRpcError::invalid_request(Some(id.clone()))),
        None => ParseFailure::Ignore {
            reason: reason.to_string(),
        },
    };

    match obj.get("jsonrpc") {
        Some(Value::String(version)) if version == "2.0" => {}
        _ => return Err(reject("missing or unsupported jsonrpc version")),
    }

    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(reject("missing method")),
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => None,
        Some(raw) => match RequestParams::from_value(raw) {
            Some(params) => Some(params),
            None => return Err(reject("params must be an object or array")),
        },
    };

    Ok(match id {
        Some(id) => IncomingMessage::Request(JsonRpcRequest::new(id, method, params)),
        None => IncomingMessage::Notification(JsonRpcNotification::new(method, params)),
    })
}

/// Best-effort id extraction for bodies whose processing failed after parsing.
pub fn extract_request_id(body: &[u8]) -> Option<RequestId> {
    let value: Value = serde_json::from_slice(body).ok()?;
    RequestId::from_value(value.get("id")?)
}
