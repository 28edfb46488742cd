use crate::metrics;
use crate::services::store::SharedStore;
use crate::websocket::fanout::{FanoutReport, MessagePipeline, PipelineError, SendContext};
use crate::websocket::membership::{JoinAuthorizer, JoinError, JoinPolicy};
use crate::websocket::message_types::{EventParseError, SendMessageEvent, WsInboundEvent};
use crate::websocket::session::ConnectionSession;
use crate::websocket::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// What a successfully handled frame did.
#[derive(Debug)]
pub enum FrameOutcome {
    Joined {
        conversation_id: Uuid,
        left: Option<Uuid>,
    },
    Delivered(FanoutReport),
}

/// Why a frame was dropped. Never reported to the client.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Malformed(#[from] EventParseError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Send(#[from] PipelineError),
}

/// The realtime core shared by every connection: registry, join
/// authorization and the ingest pipeline.
#[derive(Clone)]
pub struct ChatHub {
    registry: ConnectionRegistry,
    authorizer: JoinAuthorizer,
    pipeline: MessagePipeline,
}

impl ChatHub {
    pub fn new(store: SharedStore, join_policy: JoinPolicy) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            authorizer: JoinAuthorizer::new(store.clone(), join_policy),
            pipeline: MessagePipeline::new(store, registry.clone()),
            registry,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &MessagePipeline {
        &self.pipeline
    }

    /// Start tracking a new authenticated connection. The receiver yields
    /// every payload broadcast to the room the session joins.
    pub fn open_session(&self, user_id: Uuid) -> (ConnectionSession, UnboundedReceiver<String>) {
        let (handle, rx) = ConnectionHandle::channel();
        let session = ConnectionSession::open(user_id, handle, self.registry.clone());
        (session, rx)
    }

    pub fn parse_frame(
        &self,
        connection_id: ConnectionId,
        frame: &str,
    ) -> Result<WsInboundEvent, EventParseError> {
        match WsInboundEvent::parse(frame) {
            Ok(event) => {
                tracing::debug!(%connection_id, kind = event.kind(), "inbound event");
                Ok(event)
            }
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "dropping malformed event");
                metrics::event_dropped("malformed");
                Err(e)
            }
        }
    }

    pub async fn authorize_join(&self, user_id: Uuid, conversation_id: Uuid) -> Result<(), JoinError> {
        self.authorizer.authorize(user_id, conversation_id).await
    }

    /// Apply the result of [`ChatHub::authorize_join`] to the session.
    pub fn complete_join(
        &self,
        session: &mut ConnectionSession,
        conversation_id: Uuid,
        authorization: Result<(), JoinError>,
    ) -> Result<Option<Uuid>, JoinError> {
        match authorization {
            Ok(()) => {
                let left = session.join(conversation_id);
                metrics::join_attempt(true);
                tracing::info!(
                    connection_id = %session.id(),
                    user_id = %session.user_id(),
                    %conversation_id,
                    left = ?left,
                    "joined conversation"
                );
                Ok(left)
            }
            Err(e) => {
                metrics::join_attempt(false);
                tracing::warn!(
                    connection_id = %session.id(),
                    user_id = %session.user_id(),
                    %conversation_id,
                    error = %e,
                    "join rejected"
                );
                Err(e)
            }
        }
    }

    /// Run a send event through the pipeline. Failures are logged here and
    /// otherwise silent.
    pub async fn ingest(
        &self,
        connection_id: ConnectionId,
        ctx: SendContext,
        event: SendMessageEvent,
    ) -> Result<FanoutReport, PipelineError> {
        let conversation_id = event.conversation_id;

        match self.pipeline.ingest(ctx, event).await {
            Ok(report) => {
                metrics::message_fanned_out(report.delivered);
                tracing::debug!(
                    %connection_id,
                    %conversation_id,
                    message_id = %report.message.id,
                    delivered = report.delivered,
                    "message fanned out"
                );
                Ok(report)
            }
            Err(e) => {
                metrics::event_dropped(e.reason());
                match &e {
                    PipelineError::Persistence(_) | PipelineError::Encode(_) => tracing::error!(
                        %connection_id,
                        %conversation_id,
                        error = %e,
                        "message dropped"
                    ),
                    _ => tracing::warn!(
                        %connection_id,
                        %conversation_id,
                        error = %e,
                        "message rejected"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Handle one inbound frame to completion.
    ///
    /// In-process driver for callers that own their session across awaits,
    /// such as the integration harness. `WsSession` in `routes::wsroute` runs
    /// the same steps (`parse_frame`, `authorize_join`, `complete_join`,
    /// `ingest`) split across its mailbox so a slow store never stalls the
    /// socket.
    pub async fn handle_frame(
        &self,
        session: &mut ConnectionSession,
        frame: &str,
    ) -> Result<FrameOutcome, FrameError> {
        match self.parse_frame(session.id(), frame)? {
            WsInboundEvent::Join { conversation_id } => {
                let authorization = self.authorize_join(session.user_id(), conversation_id).await;
                let left = self.complete_join(session, conversation_id, authorization)?;
                Ok(FrameOutcome::Joined {
                    conversation_id,
                    left,
                })
            }
            WsInboundEvent::Send(event) => {
                let report = self
                    .ingest(session.id(), session.send_context(), event)
                    .await?;
                Ok(FrameOutcome::Delivered(report))
            }
        }
    }
}
