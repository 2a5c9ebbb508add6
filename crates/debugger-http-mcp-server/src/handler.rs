//! Per-request transport state machine
//!
//! One endpoint set serves two transports:
//! - `GET` opens a legacy SSE stream and announces the POST URL for it
//! - `POST ?sessionId=..` is the legacy async call: 202 now, response pushed later
//! - `POST` without a session is Streamable HTTP: the response is the body

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body::{Body, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited, StreamBody};
use hyper::header::{ALLOW, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use debugger_mcp_json_rpc_server::{
    JsonRpcDispatcher, JsonRpcError, JsonRpcMessage, SessionContext, dispatch::extract_request_id,
    r#async::panic_message,
};
use debugger_mcp_protocol::McpError;

use crate::sse::keepalive_frame;
use crate::{CorsLayer, ServerConfig, SessionReceiver, SessionRegistry};

/// HTTP body type for every response the transport produces
pub type McpBody = UnsyncBoxBody<Bytes, Infallible>;

fn full_body(bytes: impl Into<Bytes>) -> McpBody {
    Full::new(bytes.into()).boxed_unsync()
}

fn empty_response(status: StatusCode) -> Response<McpBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, text: &'static str) -> Response<McpBody> {
    let mut response = Response::new(full_body(text));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn json_response(json: String) -> Response<McpBody> {
    let mut response = Response::new(full_body(json));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Removes the session when the stream body is dropped, i.e. when the
/// client disconnects or the server shuts the stream down.
struct SessionGuard {
    sessions: SessionRegistry,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.session_id) {
            debug!(session_id = %self.session_id, "SSE stream closed");
        }
    }
}

/// Routes HTTP requests into the JSON-RPC dispatcher and back out
#[derive(Clone)]
pub struct McpTransportHandler {
    config: Arc<ServerConfig>,
    dispatcher: Arc<JsonRpcDispatcher<McpError>>,
    sessions: SessionRegistry,
}

impl McpTransportHandler {
    pub fn new(
        config: Arc<ServerConfig>,
        dispatcher: Arc<JsonRpcDispatcher<McpError>>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            config,
            dispatcher,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one HTTP request. Never fails; every outcome is a response.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!(%method, %path, "Handling request");

        let mut response = if path != self.config.mcp_path && path != self.config.sse_path {
            text_response(StatusCode::NOT_FOUND, "Not Found")
        } else {
            match method {
                Method::OPTIONS => empty_response(StatusCode::OK),
                Method::GET => self.open_stream(),
                Method::POST => match self.session_id_from_query(req.uri().query()) {
                    Some(session_id) => self.handle_session_post(session_id, req).await,
                    None => self.handle_streamable_post(req).await,
                },
                _ => {
                    let mut response =
                        text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                    response
                        .headers_mut()
                        .insert(ALLOW, HeaderValue::from_static("GET, POST, OPTIONS"));
                    response
                }
            }
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    fn session_id_from_query(&self, query: Option<&str>) -> Option<String> {
        let query = query?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == self.config.session_query_param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// The POST URL announced in the `endpoint` event
    pub fn endpoint_url(&self, session_id: &str) -> String {
        format!(
            "{}?{}={}",
            self.config.mcp_path, self.config.session_query_param, session_id
        )
    }

    fn open_stream(&self) -> Response<McpBody> {
        let (session_id, receiver) = self.sessions.open();
        // First frame on the channel, so first frame on the wire
        self.sessions
            .send(&session_id, "endpoint", &self.endpoint_url(&session_id));
        debug!(session_id = %session_id, "SSE stream opened");

        let guard = SessionGuard {
            sessions: self.sessions.clone(),
            session_id,
        };
        let keepalive = Duration::from_secs(self.config.keepalive_interval_secs.max(1));

        let mut response = Response::new(sse_body(receiver, guard, keepalive));
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        response
    }

    /// Read the request body within the configured size limit.
    async fn read_body<B>(&self, req: Request<B>) -> Result<Bytes, Response<McpBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match Limited::new(req.into_body(), self.config.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(limit = self.config.max_body_size, "Request body too large");
                Err(text_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                ))
            }
            Err(err) => {
                warn!(error = %err, "Failed to read request body");
                Err(text_response(
                    StatusCode::BAD_REQUEST,
                    "Failed to read request body",
                ))
            }
        }
    }

    /// Streamable HTTP: compute the response and return it as the body.
    async fn handle_streamable_post<B>(&self, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let body = match self.read_body(req).await {
            Ok(body) => body,
            Err(response) => return response,
        };

        if body.iter().all(u8::is_ascii_whitespace) {
            debug!("Empty Streamable HTTP body");
            return json_response(JsonRpcMessage::error(JsonRpcError::parse_error()).to_json_string());
        }
        if let Err(err) = std::str::from_utf8(&body) {
            debug!(error = %err, "Request body is not valid UTF-8");
            return json_response(JsonRpcMessage::error(JsonRpcError::parse_error()).to_json_string());
        }

        let context =
            SessionContext::default().with_metadata("transport", json!("streamable-http"));
        match self.dispatcher.handle_bytes(&body, Some(context)).await {
            Some(json) => json_response(json),
            None => empty_response(StatusCode::ACCEPTED),
        }
    }

    /// Legacy SSE: accept now, process in the background, push the response.
    async fn handle_session_post<B>(&self, session_id: String, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if !self.sessions.contains(&session_id) {
            debug!(session_id = %session_id, "POST for unknown session");
            return text_response(StatusCode::NOT_FOUND, "Session not found");
        }

        let body = match self.read_body(req).await {
            Ok(body) => body,
            Err(response) => return response,
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let context = SessionContext::for_session(session_id.clone())
                .with_metadata("transport", json!("sse"));
            let request_body = body.clone();
            // Inner task so a failure here surfaces as a JoinError, not a lost push
            let outcome = tokio::spawn(async move {
                dispatcher.handle_bytes(&request_body, Some(context)).await
            })
            .await;

            let payload = match outcome {
                Ok(Some(json)) => json,
                Ok(None) => return,
                Err(join_error) => {
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        join_error.to_string()
                    };
                    error!(session_id = %session_id, %reason, "Request task failed");
                    let Some(id) = extract_request_id(&body) else {
                        return;
                    };
                    JsonRpcMessage::error(JsonRpcError::internal_error(
                        Some(id),
                        Some(format!("Request processing failed: {}", reason)),
                    ))
                    .to_json_string()
                }
            };

            if !sessions.send(&session_id, "message", &payload) {
                warn!(session_id = %session_id, "Dropping response for closed session");
            }
        });

        empty_response(StatusCode::ACCEPTED)
    }
}

fn sse_body(mut receiver: SessionReceiver, guard: SessionGuard, keepalive: Duration) -> McpBody {
    let stream = async_stream::stream! {
        let _guard = guard;
        let mut keepalive_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);

        loop {
            tokio::select! {
                frame = receiver.recv() => {
                    match frame {
                        Some(frame) => yield Ok::<_, Infallible>(Frame::data(frame)),
                        None => break,
                    }
                },
                _ = keepalive_interval.tick() => {
                    yield Ok(Frame::data(keepalive_frame()));
                }
            }
        }
    };
    StreamBody::new(stream).boxed_unsync()
}
