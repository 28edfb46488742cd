use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub mod fanout;
pub mod hub;
pub mod membership;
pub mod message_types;
pub mod session;

pub use hub::ChatHub;

/// Unique identifier for a live connection
///
/// Assigned when the socket is accepted; used to remove exactly this
/// connection from the registry on cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The registry's view of a connection: its id and the outbound channel
/// feeding its socket writer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: UnboundedSender<String>) -> Self {
        Self { id, sender }
    }

    /// Fresh handle plus the receiving end the transport drains.
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(ConnectionId::new(), tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// False once the transport side has gone away.
    pub fn is_ready(&self) -> bool {
        !self.sender.is_closed()
    }

    fn deliver(&self, payload: &str) -> bool {
        self.sender.send(payload.to_owned()).is_ok()
    }
}

/// Connection registry for WebSocket subscribers
///
/// Tracks which connections are joined to which conversations. One instance
/// is created per server process and shared through `AppState`; clones share
/// the same map. Each conversation's set is only touched under its shard
/// lock, so broadcasts to one conversation are delivered in call order.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // conversation_id -> joined connections
    rooms: Arc<DashMap<Uuid, Vec<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a conversation, creating the entry if needed.
    ///
    /// Idempotent: returns `false` when the connection was already joined.
    pub fn join(&self, conversation_id: Uuid, handle: ConnectionHandle) -> bool {
        let mut handles = self.rooms.entry(conversation_id).or_default();
        if handles.iter().any(|h| h.id == handle.id) {
            return false;
        }
        let connection_id = handle.id;
        handles.push(handle);

        tracing::debug!(
            %connection_id,
            %conversation_id,
            subscribers = handles.len(),
            "connection joined conversation"
        );
        true
    }

    /// Remove a connection from a conversation
    ///
    /// Deletes the conversation entry once its last connection is gone.
    /// Removing a connection that is not joined is a no-op.
    pub fn leave(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        let removed = match self.rooms.get_mut(&conversation_id) {
            Some(mut handles) => {
                let before = handles.len();
                handles.retain(|h| h.id != connection_id);
                let removed = before != handles.len();
                if removed {
                    tracing::debug!(
                        %connection_id,
                        %conversation_id,
                        remaining = handles.len(),
                        "connection left conversation"
                    );
                }
                removed
            }
            None => return false,
        };

        self.remove_if_empty(conversation_id);
        removed
    }

    /// Send `payload` to every connection joined to the conversation
    ///
    /// Connections whose transport is gone are skipped and pruned. Returns
    /// the number of connections the payload was handed to.
    pub fn broadcast(&self, conversation_id: Uuid, payload: &str) -> usize {
        let delivered = match self.rooms.get_mut(&conversation_id) {
            Some(mut handles) => {
                let before = handles.len();
                handles.retain(|h| h.deliver(payload));
                let after = handles.len();

                if before != after {
                    tracing::debug!(
                        %conversation_id,
                        pruned = before - after,
                        active = after,
                        "broadcast skipped closed connections"
                    );
                }
                after
            }
            None => 0,
        };

        if delivered == 0 {
            self.remove_if_empty(conversation_id);
        }
        delivered
    }

    pub fn subscriber_count(&self, conversation_id: Uuid) -> usize {
        self.rooms
            .get(&conversation_id)
            .map(|handles| handles.len())
            .unwrap_or(0)
    }

    pub fn is_joined(&self, conversation_id: Uuid, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(&conversation_id)
            .map(|handles| handles.iter().any(|h| h.id == connection_id))
            .unwrap_or(false)
    }

    /// Number of conversations with at least one live connection.
    pub fn conversation_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_if_empty(&self, conversation_id: Uuid) {
        if self
            .rooms
            .remove_if(&conversation_id, |_, handles| handles.is_empty())
            .is_some()
        {
            tracing::debug!(%conversation_id, "removed empty conversation from registry");
        }
    }
}
