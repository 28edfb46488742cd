//! Shared harness for the fanout integration tests.
//!
//! Everything runs in-process against the in-memory store: a `TestWorld`
//! holds the hub, a `TestClient` stands in for one WebSocket connection.

#![allow(dead_code)]

use chat_fanout_service::{
    middleware::auth::Claims,
    models::{Conversation, Message},
    services::{InMemoryMessageStore, SharedStore},
    websocket::{
        hub::{FrameError, FrameOutcome},
        membership::JoinPolicy,
        session::ConnectionSession,
        ChatHub,
    },
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-access-token-secret";

pub struct TestWorld {
    pub store: Arc<InMemoryMessageStore>,
    pub hub: ChatHub,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_policy(JoinPolicy::RequireMembership)
    }

    pub fn with_policy(policy: JoinPolicy) -> Self {
        let store = Arc::new(InMemoryMessageStore::new());
        let shared: SharedStore = store.clone();
        Self {
            hub: ChatHub::new(shared, policy),
            store,
        }
    }

    pub async fn user(&self, username: &str) -> Uuid {
        self.store.insert_user(username).await.id
    }

    pub async fn direct(&self, a: Uuid, b: Uuid) -> Uuid {
        let conversation = Conversation::direct(a, b);
        let id = conversation.id;
        self.store
            .insert_conversation(conversation)
            .await
            .expect("seed direct conversation");
        id
    }

    pub async fn group(&self, owner: Uuid, members: &[Uuid]) -> Uuid {
        let conversation = Conversation::group(owner, members.iter().copied(), Some("team".into()));
        let id = conversation.id;
        self.store
            .insert_conversation(conversation)
            .await
            .expect("seed group conversation");
        id
    }

    pub fn connect(&self, user_id: Uuid) -> TestClient {
        let (session, rx) = self.hub.open_session(user_id);
        TestClient {
            user_id,
            session,
            rx,
            hub: self.hub.clone(),
        }
    }
}

pub struct TestClient {
    pub user_id: Uuid,
    pub session: ConnectionSession,
    rx: UnboundedReceiver<String>,
    hub: ChatHub,
}

impl TestClient {
    pub async fn send_frame(&mut self, frame: &str) -> Result<FrameOutcome, FrameError> {
        self.hub.handle_frame(&mut self.session, frame).await
    }

    pub async fn join(&mut self, conversation_id: Uuid) -> Result<FrameOutcome, FrameError> {
        let frame = json!({"type": "join", "conversationId": conversation_id}).to_string();
        self.send_frame(&frame).await
    }

    /// Send in the shape the web client uses: no `type` field.
    pub async fn say(
        &mut self,
        conversation_id: Uuid,
        text: &str,
    ) -> Result<FrameOutcome, FrameError> {
        let frame = json!({
            "text": text,
            "conversationId": conversation_id,
            "authorId": self.user_id,
        })
        .to_string();
        self.send_frame(&frame).await
    }

    /// Raw payloads delivered so far.
    pub fn received_raw(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    pub fn received(&mut self) -> Vec<Message> {
        self.received_raw()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("broadcast payload is a message"))
            .collect()
    }

    pub fn disconnect(&mut self) -> bool {
        self.session.close()
    }
}

pub fn access_token(user_id: Uuid, username: &str, secret: &str) -> String {
    let claims = Claims {
        user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode access token")
}
