//! Message ingest and fanout
//!
//! validate -> persist -> broadcast. Persist and broadcast for one
//! conversation run one at a time in arrival order, so members see messages
//! in the order the server accepted them even when store latency varies.

use crate::models::{Message, NewMessage};
use crate::services::store::{SharedStore, StoreError};
use crate::websocket::message_types::SendMessageEvent;
use crate::websocket::ConnectionRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message text is empty")]
    EmptyText,

    #[error("author {claimed} does not match connection user {actual}")]
    AuthorMismatch { claimed: Uuid, actual: Uuid },

    #[error("connection is not joined to conversation {0}")]
    NotJoined(Uuid),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::EmptyText => "empty_text",
            PipelineError::AuthorMismatch { .. } => "author_mismatch",
            PipelineError::NotJoined(_) => "not_joined",
            PipelineError::Persistence(_) => "persistence_failure",
            PipelineError::Encode(_) => "encode_failure",
        }
    }
}

/// Snapshot of the sending connection taken when its event arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendContext {
    pub user_id: Uuid,
    pub joined_room: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub message: Message,
    /// Connections the message was handed to, sender included
    pub delivered: usize,
}

/// One FIFO lane per conversation with a send in flight.
#[derive(Clone, Default)]
pub struct ConversationSequencer {
    lanes: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Exclusive turn on a conversation's lane; released on drop.
pub struct SequencerTurn {
    guard: Option<OwnedMutexGuard<()>>,
    conversation_id: Uuid,
    lanes: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for this conversation's turn. Waiters are served in arrival order.
    pub async fn acquire(&self, conversation_id: Uuid) -> SequencerTurn {
        let lane = self.lanes.entry(conversation_id).or_default().clone();
        let guard = lane.lock_owned().await;
        SequencerTurn {
            guard: Some(guard),
            conversation_id,
            lanes: self.lanes.clone(),
        }
    }

    /// Conversations with a turn held or awaited.
    pub fn active_lanes(&self) -> usize {
        self.lanes.len()
    }
}

impl Drop for SequencerTurn {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still holds the lane: nobody is waiting on it
        self.lanes
            .remove_if(&self.conversation_id, |_, lane| Arc::strong_count(lane) == 1);
    }
}

#[derive(Clone)]
pub struct MessagePipeline {
    store: SharedStore,
    registry: ConnectionRegistry,
    sequencer: ConversationSequencer,
}

impl MessagePipeline {
    pub fn new(store: SharedStore, registry: ConnectionRegistry) -> Self {
        Self {
            store,
            registry,
            sequencer: ConversationSequencer::new(),
        }
    }

    pub fn sequencer(&self) -> &ConversationSequencer {
        &self.sequencer
    }

    /// Check a send event against the sending connection's state.
    pub fn validate(ctx: &SendContext, event: SendMessageEvent) -> Result<NewMessage, PipelineError> {
        if event.text.trim().is_empty() {
            return Err(PipelineError::EmptyText);
        }
        if event.author_id != ctx.user_id {
            return Err(PipelineError::AuthorMismatch {
                claimed: event.author_id,
                actual: ctx.user_id,
            });
        }
        if ctx.joined_room != Some(event.conversation_id) {
            return Err(PipelineError::NotJoined(event.conversation_id));
        }

        Ok(NewMessage {
            text: event.text,
            conversation_id: event.conversation_id,
            author_id: event.author_id,
        })
    }

    /// Persist the message, then broadcast the stored representation to every
    /// connection joined to its conversation.
    ///
    /// Any error leaves no trace on the wire: nothing is broadcast and the
    /// sender gets no reply.
    pub async fn ingest(
        &self,
        ctx: SendContext,
        event: SendMessageEvent,
    ) -> Result<FanoutReport, PipelineError> {
        let new_message = Self::validate(&ctx, event)?;
        let conversation_id = new_message.conversation_id;

        let _turn = self.sequencer.acquire(conversation_id).await;

        let message = self.store.create_message(new_message).await?;
        let payload = message.to_json()?;
        let delivered = self.registry.broadcast(conversation_id, &payload);

        Ok(FanoutReport { message, delivered })
    }
}
