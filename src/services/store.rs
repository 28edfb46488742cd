//! Persistence gateway contract.
//!
//! The realtime core only needs three operations: create a message, look up a
//! conversation (for join authorization and history checks) and list a
//! conversation's history in creation order.

use crate::models::{Conversation, Message, NewMessage};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.code() {
            Some(code)
                if *code == SqlState::FOREIGN_KEY_VIOLATION
                    || *code == SqlState::CHECK_VIOLATION
                    || *code == SqlState::NOT_NULL_VIOLATION =>
            {
                StoreError::Constraint(e.to_string())
            }
            _ if e.is_closed() => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it hydrated with id, timestamp and author profile.
    async fn create_message(&self, new_message: NewMessage) -> Result<Message, StoreError>;

    async fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Messages of one conversation, oldest first.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError>;
}

pub type SharedStore = Arc<dyn MessageStore>;
