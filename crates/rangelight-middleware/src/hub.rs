//! Connection registry and broadcast hub.
//!
//! Each open WebSocket channel owns an unbounded outbound queue; its writer
//! task drains the queue into the socket. [`ConnectionRegistry::broadcast`]
//! serializes an event once and enqueues the text on every queue that is
//! still open. Delivery is best-effort and at-most-once: there is no
//! acknowledgement, no retry and no backpressure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

/// Identifies one client channel for the lifetime of its connection.
pub type ClientId = Uuid;

/// Registry of open client channels. Clone it cheaply – all clones share the
/// same set of channels.
#[derive(Clone, Debug, Default)]
pub struct ConnectionRegistry {
    clients: Arc<Mutex<HashMap<ClientId, UnboundedSender<String>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel. The returned receiver yields every frame queued for it,
    /// whether a direct response or a broadcast.
    pub fn register(&self) -> (ClientId, UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        debug!(client = %id, "client registered");
        (id, rx)
    }

    /// Sender for a registered channel, used to queue direct responses.
    pub fn sender(&self, id: ClientId) -> Option<UnboundedSender<String>> {
        self.lock().get(&id).cloned()
    }

    /// Remove a channel. Unknown ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        if self.lock().remove(&id).is_some() {
            debug!(client = %id, "client unregistered");
        }
    }

    /// Serialize `event` once and queue it on every open channel.
    ///
    /// Channels whose receiver has gone away are skipped and pruned. Returns
    /// the number of channels the frame was queued on.
    pub fn broadcast<T: Serialize + ?Sized>(&self, event: &T) -> Result<usize, serde_json::Error> {
        let frame = serde_json::to_string(event)?;
        Ok(self.broadcast_text(&frame))
    }

    /// Queue an already serialized frame on every open channel.
    pub fn broadcast_text(&self, frame: &str) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, tx| tx.send(frame.to_owned()).is_ok());
        let reached = clients.len();
        if reached < before {
            debug!(pruned = before - reached, "dropped closed channels");
        }
        reached
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, UnboundedSender<String>>> {
        // The map stays consistent even if a holder panicked mid-broadcast.
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
