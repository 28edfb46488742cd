use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A direct or group conversation as seen by the realtime core.
///
/// Membership is fixed at creation; nothing in this service adds or removes
/// members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub is_group: bool,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub owner_id: Option<Uuid>,
    pub member_ids: HashSet<Uuid>,
}

impl Conversation {
    pub fn direct(user_a: Uuid, user_b: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_group: false,
            name: None,
            avatar: None,
            owner_id: None,
            member_ids: [user_a, user_b].into_iter().collect(),
        }
    }

    /// Group conversation owned by `owner`; the owner is always a member.
    pub fn group(owner: Uuid, members: impl IntoIterator<Item = Uuid>, name: Option<String>) -> Self {
        let mut member_ids: HashSet<Uuid> = members.into_iter().collect();
        member_ids.insert(owner);
        Self {
            id: Uuid::new_v4(),
            is_group: true,
            name,
            avatar: None,
            owner_id: Some(owner),
            member_ids,
        }
    }

    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// A direct conversation has exactly two distinct members.
    pub fn is_well_formed(&self) -> bool {
        self.is_group || self.member_ids.len() == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_conversation_membership() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Conversation::direct(a, b);

        assert!(!conversation.is_group);
        assert!(conversation.has_member(a));
        assert!(conversation.has_member(b));
        assert!(!conversation.has_member(Uuid::new_v4()));
        assert!(conversation.is_well_formed());
    }

    #[test]
    fn test_direct_conversation_with_self_is_malformed() {
        let a = Uuid::new_v4();
        assert!(!Conversation::direct(a, a).is_well_formed());
    }

    #[test]
    fn test_group_includes_owner() {
        let owner = Uuid::new_v4();
        let group = Conversation::group(owner, [Uuid::new_v4()], Some("team".into()));
        assert!(group.has_member(owner));
        assert_eq!(group.owner_id, Some(owner));
        assert_eq!(group.member_ids.len(), 2);
    }
}
