use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    dispatch::{self, IncomingMessage, ParseFailure},
    error::{JsonRpcError, JsonRpcErrorObject},
    notification::JsonRpcNotification,
    request::{JsonRpcRequest, RequestParams},
    response::{JsonRpcMessage, ResponseResult},
};

/// Transport facts handed to handlers alongside each call
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Push-delivery session the request arrived on, if any
    pub session_id: Option<String>,
    /// Free-form transport metadata (e.g. `"transport": "sse"`)
    pub metadata: HashMap<String, Value>,
}

impl SessionContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Trait for handling JSON-RPC method calls
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    /// The error type returned by this handler
    type Error: ToJsonRpcError;

    /// Handle a JSON-RPC method call.
    /// Returns domain errors only - the dispatcher converts them to JSON-RPC errors.
    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> Result<Value, Self::Error>;

    /// Handle a JSON-RPC notification (default ignores it)
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, session_context);
        Ok(())
    }

    /// List supported methods (used for introspection)
    fn supported_methods(&self) -> Vec<String> {
        vec![]
    }
}

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Render a caught panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// JSON-RPC method dispatcher with specific error type
///
/// Every handler invocation runs behind `catch_unwind`, so a panicking
/// handler produces an Internal Error envelope instead of unwinding into the
/// transport.
pub struct JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Error = E>>>,
}

impl<E> JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a specific method
    pub fn register_method<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    /// Register one handler for several methods
    pub fn register_methods<H>(&mut self, methods: Vec<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        let handler_arc: Arc<dyn JsonRpcHandler<Error = E>> = Arc::new(handler);
        for method in methods {
            self.handlers.insert(method, Arc::clone(&handler_arc));
        }
    }

    /// Get all registered methods
    pub fn registered_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Process a raw body: parse, classify, route.
    ///
    /// Returns `None` exactly when nothing may be sent back (notifications,
    /// including malformed ones that carry no id).
    pub async fn handle_message(
        &self,
        body: &[u8],
        session_context: Option<SessionContext>,
    ) -> Option<JsonRpcMessage> {
        match dispatch::parse_json_rpc_message(body) {
            Ok(IncomingMessage::Request(request)) => {
                Some(self.handle_request_with_context(request, session_context).await)
            }
            Ok(IncomingMessage::Notification(notification)) => {
                self.handle_notification_with_context(notification, session_context)
                    .await;
                None
            }
            Err(ParseFailure::Reply(error)) => {
                debug!(code = error.error.code, "Rejecting malformed JSON-RPC body");
                Some(JsonRpcMessage::error(error))
            }
            Err(ParseFailure::Ignore { reason }) => {
                warn!(%reason, "Dropping malformed JSON-RPC message without id");
                None
            }
        }
    }

    /// Same as [`handle_message`](Self::handle_message) but serialized for the wire.
    pub async fn handle_bytes(
        &self,
        body: &[u8],
        session_context: Option<SessionContext>,
    ) -> Option<String> {
        self.handle_message(body, session_context)
            .await
            .map(|message| message.to_json_string())
    }

    /// Route a request to its handler and build the response envelope
    pub async fn handle_request_with_context(
        &self,
        request: JsonRpcRequest,
        session_context: Option<SessionContext>,
    ) -> JsonRpcMessage {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let Some(handler) = self.handlers.get(&method) else {
            debug!(%method, "No handler registered");
            return JsonRpcMessage::error(JsonRpcError::method_not_found(id, &method));
        };

        let outcome = AssertUnwindSafe(handler.handle(&method, params, session_context))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => JsonRpcMessage::success(id, ResponseResult::from(result)),
            Ok(Err(domain_error)) => {
                let error_object = domain_error.to_error_object();
                debug!(%method, code = error_object.code, "Handler returned error");
                JsonRpcMessage::error(JsonRpcError::new(Some(id), error_object))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%method, panic_message = %message, "Handler panicked");
                JsonRpcMessage::error(JsonRpcError::internal_error(
                    Some(id),
                    Some(format!("Handler for '{}' panicked: {}", method, message)),
                ))
            }
        }
    }

    /// Process a request without transport context
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        self.handle_request_with_context(request, None).await
    }

    /// Process a notification. Failures are logged, never answered.
    pub async fn handle_notification_with_context(
        &self,
        notification: JsonRpcNotification,
        session_context: Option<SessionContext>,
    ) {
        let JsonRpcNotification { method, params, .. } = notification;

        let Some(handler) = self.handlers.get(&method) else {
            debug!(%method, "Ignoring unknown notification");
            return;
        };

        let outcome = AssertUnwindSafe(handler.handle_notification(
            &method,
            params,
            session_context,
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%method, error = %err, "Notification handler failed"),
            Err(payload) => error!(
                %method,
                panic_message = %panic_message(payload.as_ref()),
                "Notification handler panicked"
            ),
        }
    }
}

impl<E> Default for JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestId, error_codes};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("Test error: {0}")]
        TestError(String),
    }

    impl ToJsonRpcError for TestError {
        fn to_error_object(&self) -> JsonRpcErrorObject {
            match self {
                TestError::TestError(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
            }
        }
    }

    #[derive(Default)]
    struct TestHandler {
        notifications: AtomicUsize,
    }

    #[async_trait]
    impl JsonRpcHandler for TestHandler {
        type Error = TestError;

        async fn handle(
            &self,
            method: &str,
            _params: Option<RequestParams>,
            _session_context: Option<SessionContext>,
        ) -> Result<Value, Self::Error> {
            match method {
                "add" => Ok(json!({"result": "addition"})),
                "explode" => panic!("kaboom"),
                _ => Err(TestError::TestError("test error".to_string())),
            }
        }

        async fn handle_notification(
            &self,
            _method: &str,
            _params: Option<RequestParams>,
            _session_context: Option<SessionContext>,
        ) -> Result<(), Self::Error> {
            self.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher() -> JsonRpcDispatcher<TestError> {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register_methods(
            vec!["add".to_string(), "fail".to_string(), "explode".to_string()],
            TestHandler::default(),
        );
        dispatcher
    }

    #[tokio::test]
    async fn test_dispatcher_success() {
        let request = JsonRpcRequest::new_no_params(RequestId::from(1), "add");
        let response = dispatcher().handle_request(request).await;
        assert_eq!(response.id(), Some(&RequestId::from(1)));
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_dispatcher_method_not_found() {
        let request = JsonRpcRequest::new_no_params(RequestId::from(1), "unknown");
        let response = dispatcher().handle_request(request).await;
        assert_eq!(response.id(), Some(&RequestId::from(1)));
        let JsonRpcMessage::Error(err) = response else {
            panic!("expected error");
        };
        assert_eq!(err.error.code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let request = JsonRpcRequest::new_no_params(RequestId::from("p"), "explode");
        let response = dispatcher().handle_request(request).await;
        let JsonRpcMessage::Error(err) = response else {
            panic!("expected error");
        };
        assert_eq!(err.id, Some(RequestId::from("p")));
        assert_eq!(err.error.code, error_codes::INTERNAL_ERROR);
        assert!(err.error.message.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_handle_bytes_notification_returns_none() {
        let dispatcher = dispatcher();
        let out = dispatcher
            .handle_bytes(br#"{"jsonrpc":"2.0","method":"add"}"#, None)
            .await;
        assert!(out.is_none());

        let out = dispatcher
            .handle_bytes(br#"{"jsonrpc":"2.0","method":"unknown/thing"}"#, None)
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_handle_bytes_parse_error() {
        let out = dispatcher().handle_bytes(b"{{{", None).await.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_handle_bytes_echoes_string_id() {
        let out = dispatcher()
            .handle_bytes(br#"{"jsonrpc":"2.0","id":"abc-1","method":"fail"}"#, None)
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], "abc-1");
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["message"], "test error");
    }

    #[tokio::test]
    async fn test_handle_bytes_echoes_any_numeric_id() {
        let dispatcher = dispatcher();
        for id in ["18446744073709551615", "1.5", "-9223372036854775808"] {
            let body = format!(r#"{{"jsonrpc":"2.0","id":{},"method":"add"}}"#, id);
            let out = dispatcher.handle_bytes(body.as_bytes(), None).await.unwrap();
            assert_eq!(
                out,
                format!(r#"{{"jsonrpc":"2.0","id":{},"result":{{"result":"addition"}}}}"#, id)
            );
        }
    }
}
