use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Inbound WebSocket events from client to server
///
/// Frames are JSON objects discriminated by `type`. A frame without a `type`
/// is a message send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsInboundEvent {
    Join { conversation_id: Uuid },
    Send(SendMessageEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageEvent {
    pub text: String,
    pub conversation_id: Uuid,
    pub author_id: Uuid,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("frame is not a valid event: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInboundEvent {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default, alias = "chatId")]
    conversation_id: Option<Uuid>,
    #[serde(default)]
    author_id: Option<Uuid>,
    #[serde(default)]
    text: Option<String>,
}

impl WsInboundEvent {
    pub fn parse(frame: &str) -> Result<Self, EventParseError> {
        let raw: RawInboundEvent = serde_json::from_str(frame)?;
        let conversation_id = raw
            .conversation_id
            .ok_or(EventParseError::MissingField("conversationId"))?;

        match raw.kind.as_deref() {
            Some("join") => Ok(WsInboundEvent::Join { conversation_id }),
            None | Some("message") => Ok(WsInboundEvent::Send(SendMessageEvent {
                text: raw.text.ok_or(EventParseError::MissingField("text"))?,
                conversation_id,
                author_id: raw
                    .author_id
                    .ok_or(EventParseError::MissingField("authorId"))?,
            })),
            Some(other) => Err(EventParseError::UnknownType(other.to_string())),
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            WsInboundEvent::Join { .. } => "join",
            WsInboundEvent::Send(_) => "message",
        }
    }
}
