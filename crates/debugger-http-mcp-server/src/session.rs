//! Push-delivery session registry for the legacy SSE transport
//!
//! A session is created when a client opens an event stream and lives until
//! that stream goes away or the session is removed explicitly. Each session
//! exclusively owns the sending half of its stream's channel; removing the
//! session drops that sender, which ends the stream.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::sse::format_sse_frame;

/// Sending half of a session's outbound stream
pub type SessionSender = mpsc::UnboundedSender<Bytes>;
/// Receiving half, drained by the SSE response body
pub type SessionReceiver = mpsc::UnboundedReceiver<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// A single push-delivery session
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    sender: Mutex<Option<SessionSender>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Open),
            sender: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Bind the delivery channel. Fails once the session is no longer open.
    fn attach(&self, sender: SessionSender) -> bool {
        let mut slot = self.sender.lock();
        if self.state() != SessionState::Open {
            return false;
        }
        *slot = Some(sender);
        true
    }

    /// Open, and if a channel is attached its receiver is still alive.
    fn is_live(&self) -> bool {
        if self.state() != SessionState::Open {
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(sender) => !sender.is_closed(),
            None => true,
        }
    }

    /// Queue a pre-framed chunk. False when no channel is attached or the
    /// stream is gone.
    fn push(&self, frame: Bytes) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Close the channel. Only the first call has any effect.
    fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return false;
            }
            *state = SessionState::Closing;
        }
        // Dropping the sender ends the receiving stream
        let sender = self.sender.lock().take();
        drop(sender);
        *self.state.lock() = SessionState::Closed;
        true
    }
}

/// Summary of an open session for status output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
}

/// Thread-safe map of session id to session
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new open session with no channel attached yet.
    pub fn create(&self) -> String {
        let id = Uuid::now_v7().simple().to_string();
        self.sessions
            .insert(id.clone(), Arc::new(Session::new(id.clone())));
        debug!(session_id = %id, "Session created");
        id
    }

    /// Bind a delivery channel to an existing session.
    pub fn attach(&self, id: &str, sender: SessionSender) -> bool {
        match self.sessions.get(id) {
            Some(entry) => entry.value().attach(sender),
            None => false,
        }
    }

    /// Create a session with a fresh channel attached.
    pub fn open(&self) -> (String, SessionReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.create();
        self.attach(&id, sender);
        (id, receiver)
    }

    /// Look up a live session. Sessions whose stream has gone away are
    /// removed here and reported as missing.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).map(|entry| Arc::clone(entry.value()))?;
        if session.is_live() {
            Some(session)
        } else {
            debug!(session_id = %id, "Removing stale session");
            self.remove(id);
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Frame `data` as an SSE event and queue it on the session's stream.
    ///
    /// Returns false, without failing, when the session is unknown, closed or
    /// its stream is gone.
    pub fn send(&self, id: &str, event_type: &str, data: &str) -> bool {
        let Some(session) = self.get(id) else {
            return false;
        };
        let frame = Bytes::from(format_sse_frame(event_type, data));
        if session.push(frame) {
            true
        } else {
            self.remove(id);
            false
        }
    }

    /// Remove a session and close its channel. Idempotent.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.close();
                debug!(session_id = %id, "Session removed");
                true
            }
            None => false,
        }
    }

    /// Remove every session, ending all open streams.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| SessionInfo {
                id: entry.key().clone(),
                created_at: entry.value().created_at(),
                state: entry.value().state(),
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_create_is_open_without_channel() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        let session = registry.get(&id).unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.id(), id);
        // nothing to deliver to yet
        assert!(!registry.send(&id, "message", "x"));
    }

    #[test]
    fn test_ids_are_unique_and_opaque() {
        let registry = SessionRegistry::new();
        let ids: HashSet<String> = (0..10_000).map(|_| registry.create()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids.iter().all(|id| id.len() == 32 && !id.contains('-')));
    }

    #[tokio::test]
    async fn test_send_frames_and_preserves_order() {
        let registry = SessionRegistry::new();
        let (id, mut rx) = registry.open();

        assert!(registry.send(&id, "message", "first"));
        assert!(registry.send(&id, "message", "second\nline"));

        assert_eq!(rx.recv().await.unwrap(), "event: message\ndata: first\n\n");
        assert_eq!(
            rx.recv().await.unwrap(),
            "event: message\ndata: second\ndata: line\n\n"
        );
    }

    #[tokio::test]
    async fn test_remove_closes_channel_once() {
        let registry = SessionRegistry::new();
        let (id, mut rx) = registry.open();
        let session = registry.get(&id).unwrap();

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(rx.recv().await.is_none());
        assert!(!registry.send(&id, "message", "late"));
    }

    #[test]
    fn test_send_to_unknown_session_is_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.send("nope", "message", "{}"));
    }

    #[test]
    fn test_dropped_receiver_is_lazily_removed() {
        let registry = SessionRegistry::new();
        let (id, rx) = registry.open();
        drop(rx);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_attach_after_remove_fails() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        registry.remove(&id);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!registry.attach(&id, tx));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let (_a, mut rx_a) = registry.open();
        let (_b, mut rx_b) = registry.open();

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(rx_a.recv().await.is_none());
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_create_send_remove() {
        let registry = SessionRegistry::new();
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (id, mut rx) = registry.open();
                assert!(registry.send(&id, "message", "ping"));
                assert!(rx.recv().await.is_some());
                assert!(registry.remove(&id));
                assert!(!registry.send(&id, "message", "ping"));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
