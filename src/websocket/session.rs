//! Per-connection state and its lifecycle.
//!
//! A [`ConnectionSession`] owns the connection's registry handle and room
//! state. Closing it (explicitly or by drop) removes the connection from the
//! registry exactly once.

use crate::metrics;
use crate::websocket::fanout::SendContext;
use crate::websocket::membership::RoomMembership;
use crate::websocket::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use uuid::Uuid;

pub struct ConnectionSession {
    handle: ConnectionHandle,
    user_id: Uuid,
    membership: RoomMembership,
    registry: ConnectionRegistry,
    closed: bool,
}

impl ConnectionSession {
    pub fn open(user_id: Uuid, handle: ConnectionHandle, registry: ConnectionRegistry) -> Self {
        metrics::connection_opened();
        tracing::debug!(connection_id = %handle.id(), %user_id, "connection opened");
        Self {
            handle,
            user_id,
            membership: RoomMembership::Unjoined,
            registry,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn membership(&self) -> RoomMembership {
        self.membership
    }

    pub fn joined_room(&self) -> Option<Uuid> {
        self.membership.joined_room()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn send_context(&self) -> SendContext {
        SendContext {
            user_id: self.user_id,
            joined_room: self.joined_room(),
        }
    }

    /// Register this connection in `conversation_id`'s room. Call only after
    /// the join has been authorized.
    ///
    /// A connection is in at most one room: joining another room leaves the
    /// previous one first. Returns the room that was left, if any. Ignored
    /// once the session is closed.
    pub fn join(&mut self, conversation_id: Uuid) -> Option<Uuid> {
        if self.closed {
            tracing::debug!(connection_id = %self.id(), %conversation_id, "join after close ignored");
            return None;
        }

        let previous = self.membership.enter(conversation_id);
        if let Some(previous) = previous {
            self.registry.leave(self.id(), previous);
        }
        self.registry.join(conversation_id, self.handle.clone());
        previous
    }

    /// Tear down: leave the joined room and mark the session closed.
    ///
    /// Returns `true` only for the call that actually closed the session.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        if let Some(conversation_id) = self.membership.exit() {
            self.registry.leave(self.id(), conversation_id);
        }
        metrics::connection_closed();
        tracing::debug!(connection_id = %self.id(), user_id = %self.user_id, "connection closed");
        true
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.close();
    }
}
