//! Room membership protocol
//!
//! Each connection is either `Unjoined` or `Joined(conversation)`. Joining is
//! gated by a [`JoinAuthorizer`] whose policy is chosen at startup.

use crate::error::AppError;
use crate::services::store::{SharedStore, StoreError};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Per-connection room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomMembership {
    #[default]
    Unjoined,
    Joined(Uuid),
}

impl RoomMembership {
    pub fn joined_room(&self) -> Option<Uuid> {
        match self {
            RoomMembership::Joined(conversation_id) => Some(*conversation_id),
            RoomMembership::Unjoined => None,
        }
    }

    /// Move to `Joined(conversation_id)`, returning the room that must be left
    /// (only when it differs from the new one).
    pub fn enter(&mut self, conversation_id: Uuid) -> Option<Uuid> {
        let previous = self.joined_room().filter(|prev| *prev != conversation_id);
        *self = RoomMembership::Joined(conversation_id);
        previous
    }

    /// Move back to `Unjoined`, returning the room that was joined.
    pub fn exit(&mut self) -> Option<Uuid> {
        std::mem::take(self).joined_room()
    }
}

/// Who may join a conversation's live room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Only members of the conversation, same rule as history fetch
    #[default]
    RequireMembership,
    /// Any authenticated connection that knows the id
    Permissive,
}

impl FromStr for JoinPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "require_membership" | "membership" => Ok(JoinPolicy::RequireMembership),
            "permissive" => Ok(JoinPolicy::Permissive),
            other => Err(AppError::Config(format!(
                "JOIN_POLICY must be `require_membership` or `permissive`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("user {user_id} is not a member of conversation {conversation_id}")]
    NotAMember { user_id: Uuid, conversation_id: Uuid },

    #[error("membership lookup failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct JoinAuthorizer {
    store: SharedStore,
    policy: JoinPolicy,
}

impl JoinAuthorizer {
    pub fn new(store: SharedStore, policy: JoinPolicy) -> Self {
        if policy == JoinPolicy::Permissive {
            tracing::warn!("join policy is permissive: room joins skip the membership check");
        }
        Self { store, policy }
    }

    pub async fn authorize(&self, user_id: Uuid, conversation_id: Uuid) -> Result<(), JoinError> {
        if self.policy == JoinPolicy::Permissive {
            return Ok(());
        }

        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await?
            .ok_or(JoinError::ConversationNotFound(conversation_id))?;

        if !conversation.has_member(user_id) {
            return Err(JoinError::NotAMember {
                user_id,
                conversation_id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Conversation;
    use crate::services::InMemoryMessageStore;
    use std::sync::Arc;

    #[test]
    fn test_enter_and_exit() {
        let mut membership = RoomMembership::default();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(membership.enter(c1), None);
        assert_eq!(membership.joined_room(), Some(c1));

        // Re-entering the same room has nothing to leave
        assert_eq!(membership.enter(c1), None);

        assert_eq!(membership.enter(c2), Some(c1));
        assert_eq!(membership.exit(), Some(c2));
        assert_eq!(membership, RoomMembership::Unjoined);
        assert_eq!(membership.exit(), None);
    }

    #[test]
    fn test_join_policy_from_str() {
        assert_eq!(
            "require_membership".parse::<JoinPolicy>().unwrap(),
            JoinPolicy::RequireMembership
        );
        assert_eq!(
            "Permissive".parse::<JoinPolicy>().unwrap(),
            JoinPolicy::Permissive
        );
        assert!("open".parse::<JoinPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_membership_policy_checks_members() {
        let store = Arc::new(InMemoryMessageStore::new());
        let ada = store.insert_user("ada").await;
        let bob = store.insert_user("bob").await;
        let eve = store.insert_user("eve").await;
        let conversation = Conversation::direct(ada.id, bob.id);
        store.insert_conversation(conversation.clone()).await.unwrap();

        let authorizer = JoinAuthorizer::new(store, JoinPolicy::RequireMembership);

        assert!(authorizer.authorize(ada.id, conversation.id).await.is_ok());
        assert!(matches!(
            authorizer.authorize(eve.id, conversation.id).await,
            Err(JoinError::NotAMember { .. })
        ));
        assert!(matches!(
            authorizer.authorize(ada.id, Uuid::new_v4()).await,
            Err(JoinError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_permissive_policy_skips_lookup() {
        let store = Arc::new(InMemoryMessageStore::new());
        store.set_unavailable(true);
        let authorizer = JoinAuthorizer::new(store, JoinPolicy::Permissive);

        assert!(authorizer
            .authorize(Uuid::new_v4(), Uuid::new_v4())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_denies_join() {
        let store = Arc::new(InMemoryMessageStore::new());
        store.set_unavailable(true);
        let authorizer = JoinAuthorizer::new(store, JoinPolicy::RequireMembership);

        assert!(matches!(
            authorizer.authorize(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(JoinError::Store(StoreError::Unavailable(_)))
        ));
    }
}
