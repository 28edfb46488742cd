use crate::models::{AuthorProfile, Conversation, Message, NewMessage};
use crate::services::store::{MessageStore, StoreError};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

/// PostgreSQL-backed persistence gateway.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: Pool,
}

impl PgMessageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn message_from_row(row: &Row) -> Message {
        let author_id: Uuid = row.get("author_id");
        Message {
            id: row.get("id"),
            text: row.get("text"),
            author_id,
            author: AuthorProfile {
                id: author_id,
                username: row.get("username"),
                avatar: row.get("avatar"),
                bio: row.get("bio"),
                created_at: row.get("author_created_at"),
            },
            conversation_id: row.get("conversation_id"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_message(&self, new_message: NewMessage) -> Result<Message, StoreError> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();

        // Insert and hydrate the author in one round trip
        let row = client
            .query_one(
                r#"
                WITH inserted AS (
                    INSERT INTO messages (id, text, author_id, conversation_id)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, text, author_id, conversation_id, created_at
                )
                SELECT
                    i.id,
                    i.text,
                    i.author_id,
                    i.conversation_id,
                    i.created_at,
                    u.username,
                    u.avatar,
                    u.bio,
                    u.created_at AS author_created_at
                FROM inserted i
                JOIN users u ON u.id = i.author_id
                "#,
                &[
                    &id,
                    &new_message.text,
                    &new_message.author_id,
                    &new_message.conversation_id,
                ],
            )
            .await?;

        Ok(Self::message_from_row(&row))
    }

    async fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, StoreError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                r#"
                SELECT
                    c.id,
                    c.is_group,
                    c.name,
                    c.avatar,
                    c.owner_id,
                    COALESCE(
                        array_agg(cm.user_id) FILTER (WHERE cm.user_id IS NOT NULL),
                        '{}'::uuid[]
                    ) AS member_ids
                FROM conversations c
                LEFT JOIN conversation_members cm ON cm.conversation_id = c.id
                WHERE c.id = $1
                GROUP BY c.id
                "#,
                &[&conversation_id],
            )
            .await?;

        Ok(row.map(|row| {
            let member_ids: Vec<Uuid> = row.get("member_ids");
            Conversation {
                id: row.get("id"),
                is_group: row.get("is_group"),
                name: row.get("name"),
                avatar: row.get("avatar"),
                owner_id: row.get("owner_id"),
                member_ids: member_ids.into_iter().collect(),
            }
        }))
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT
                    m.id,
                    m.text,
                    m.author_id,
                    m.conversation_id,
                    m.created_at,
                    u.username,
                    u.avatar,
                    u.bio,
                    u.created_at AS author_created_at
                FROM messages m
                JOIN users u ON u.id = m.author_id
                WHERE m.conversation_id = $1
                ORDER BY m.created_at ASC, m.seq ASC
                "#,
                &[&conversation_id],
            )
            .await?;

        Ok(rows.iter().map(Self::message_from_row).collect())
    }
}
