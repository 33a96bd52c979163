//! Session Registry: the set of live control connections.
//!
//! The registry is owned by the controller task, so registration, removal
//! and broadcast are naturally serialized. Each session is reached through
//! its outbound channel; the WebSocket writer on the other end drains it
//! into the socket. A send failure means the writer is gone, and the
//! session is dropped on the spot rather than reported.

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for one live connection.
pub type SessionId = Uuid;

/// Tracks live sessions and fans messages out to them.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, mpsc::UnboundedSender<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session's outbound channel.
    pub fn add(&mut self, id: SessionId, tx: mpsc::UnboundedSender<String>) {
        self.sessions.insert(id, tx);
    }

    /// Remove a session. Safe to call for ids that are already gone.
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Send a message to a single session, dropping it if the transport is
    /// already closed.
    pub fn send_to(&mut self, id: SessionId, message: &str) {
        if let Some(tx) = self.sessions.get(&id) {
            if tx.send(message.to_string()).is_err() {
                tracing::debug!(session = %id, "Dropping closed session");
                self.sessions.remove(&id);
            }
        }
    }

    /// Send the same message to every registered session.
    ///
    /// Sessions whose transport has closed are removed; nobody else is
    /// affected by a neighbor's failure.
    pub fn broadcast(&mut self, message: &str) {
        self.sessions.retain(|id, tx| {
            let ok = tx.send(message.to_string()).is_ok();
            if !ok {
                tracing::debug!(session = %id, "Dropping closed session during broadcast");
            }
            ok
        });
    }
}
