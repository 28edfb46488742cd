//! Process-local persistence gateway.
//!
//! Backs `STORE_BACKEND=memory` for local runs and every test that does not
//! need Postgres. Supports fault injection (unavailability, write latency).

use crate::models::{AuthorProfile, Conversation, Message, NewMessage};
use crate::services::store::{MessageStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, AuthorProfile>,
    conversations: HashMap<Uuid, Conversation>,
    messages: Vec<Message>,
    last_created_at: HashMap<Uuid, DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<Inner>,
    unavailable: AtomicBool,
    write_delays: Mutex<VecDeque<Duration>>,
    create_calls: AtomicUsize,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, username: &str) -> AuthorProfile {
        let profile = AuthorProfile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            avatar: None,
            bio: None,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .users
            .insert(profile.id, profile.clone());
        profile
    }

    /// Register a conversation. Every member must be a known user and a
    /// direct conversation must have exactly two members.
    pub async fn insert_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        if !conversation.is_well_formed() {
            return Err(StoreError::Constraint(format!(
                "direct conversation {} must have exactly two members",
                conversation.id
            )));
        }

        let mut inner = self.inner.write().await;
        if let Some(unknown) = conversation
            .member_ids
            .iter()
            .find(|id| !inner.users.contains_key(id))
        {
            return Err(StoreError::Constraint(format!("unknown member {unknown}")));
        }
        inner.conversations.insert(conversation.id, conversation);
        Ok(())
    }

    /// Simulate the backing store going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay the next `create_message` call by `delay`. Delays queue up in order.
    pub async fn push_write_delay(&self, delay: Duration) {
        self.write_delays.lock().await.push_back(delay);
    }

    /// Number of `create_message` calls that reached the store, successful or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, new_message: NewMessage) -> Result<Message, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let delay = self.write_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.write().await;

        if !inner.conversations.contains_key(&new_message.conversation_id) {
            return Err(StoreError::Constraint(format!(
                "conversation {} does not exist",
                new_message.conversation_id
            )));
        }
        let author = inner
            .users
            .get(&new_message.author_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Constraint(format!("author {} does not exist", new_message.author_id))
            })?;

        // Keep creation time monotonic per conversation
        let mut created_at = Utc::now();
        if let Some(last) = inner.last_created_at.get(&new_message.conversation_id) {
            if created_at <= *last {
                created_at = *last + ChronoDuration::microseconds(1);
            }
        }
        inner
            .last_created_at
            .insert(new_message.conversation_id, created_at);

        let message = Message {
            id: Uuid::new_v4(),
            text: new_message.text,
            author_id: author.id,
            author,
            conversation_id: new_message.conversation_id,
            created_at,
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .inner
            .read()
            .await
            .conversations
            .get(&conversation_id)
            .cloned())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemoryMessageStore, AuthorProfile, Conversation) {
        let store = InMemoryMessageStore::new();
        let ada = store.insert_user("ada").await;
        let bob = store.insert_user("bob").await;
        let conversation = Conversation::direct(ada.id, bob.id);
        store.insert_conversation(conversation.clone()).await.unwrap();
        (store, ada, conversation)
    }

    #[tokio::test]
    async fn test_create_message_hydrates_author() {
        let (store, ada, conversation) = seeded().await;

        let message = store
            .create_message(NewMessage {
                text: "hello".into(),
                conversation_id: conversation.id,
                author_id: ada.id,
            })
            .await
            .unwrap();

        assert_eq!(message.author, ada);
        assert_eq!(message.conversation_id, conversation.id);
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_with_increasing_timestamps() {
        let (store, ada, conversation) = seeded().await;

        for text in ["one", "two", "three"] {
            store
                .create_message(NewMessage {
                    text: text.into(),
                    conversation_id: conversation.id,
                    author_id: ada.id,
                })
                .await
                .unwrap();
        }

        let history = store.list_messages(conversation.id).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(history.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_writes() {
        let (store, ada, conversation) = seeded().await;
        store.set_unavailable(true);

        let err = store
            .create_message(NewMessage {
                text: "lost".into(),
                conversation_id: conversation.id,
                author_id: ada.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.create_calls(), 1);
        assert_eq!(store.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_malformed_direct_conversation() {
        let store = InMemoryMessageStore::new();
        let ada = store.insert_user("ada").await;

        let err = store
            .insert_conversation(Conversation::direct(ada.id, ada.id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_rejects_unknown_conversation() {
        let (store, ada, _) = seeded().await;

        let err = store
            .create_message(NewMessage {
                text: "hi".into(),
                conversation_id: Uuid::new_v4(),
                author_id: ada.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }
}
