use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of a message author, hydrated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted chat message.
///
/// The wire shape (camelCase) is what every joined connection receives on
/// broadcast and what the history endpoint returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub author_id: Uuid,
    pub author: AuthorProfile,
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Input to the store's create operation. Id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub conversation_id: Uuid,
    pub author_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_camel_case() {
        let author_id = Uuid::new_v4();
        let message = Message {
            id: Uuid::new_v4(),
            text: "hi".to_string(),
            author_id,
            author: AuthorProfile {
                id: author_id,
                username: "ada".to_string(),
                avatar: None,
                bio: Some("hello".to_string()),
                created_at: Utc::now(),
            },
            conversation_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["text"], "hi");
        assert_eq!(value["authorId"], author_id.to_string());
        assert_eq!(value["conversationId"], message.conversation_id.to_string());
        assert_eq!(value["author"]["username"], "ada");
        assert!(value.get("createdAt").is_some());
    }
}
