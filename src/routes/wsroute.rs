use crate::config::WebSocketConfig;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use crate::websocket::message_types::WsInboundEvent;
use crate::websocket::session::ConnectionSession;
use crate::websocket::ChatHub;
use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler, WrapFuture};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// WebSocket Actor
struct WsSession {
    session: ConnectionSession,
    hub: ChatHub,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    // Taken in `started` and attached as a stream
    outbound: Option<UnboundedReceiver<String>>,
}

impl WsSession {
    fn new(
        session: ConnectionSession,
        hub: ChatHub,
        config: &WebSocketConfig,
        outbound: UnboundedReceiver<String>,
    ) -> Self {
        Self {
            session,
            hub,
            hb: Instant::now(),
            heartbeat_interval: config.heartbeat_interval,
            client_timeout: config.client_timeout,
            outbound: Some(outbound),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let client_timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > client_timeout {
                tracing::warn!(
                    connection_id = %act.session.id(),
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let event = match self.hub.parse_frame(self.session.id(), text) {
            Ok(event) => event,
            Err(_) => return,
        };

        match event {
            WsInboundEvent::Join { conversation_id } => {
                // Hold the mailbox until the join lands so later sends see it
                let hub = self.hub.clone();
                let user_id = self.session.user_id();
                ctx.wait(
                    async move { hub.authorize_join(user_id, conversation_id).await }
                        .into_actor(self)
                        .map(move |authorization, act, _ctx| {
                            let _ = act.hub.complete_join(
                                &mut act.session,
                                conversation_id,
                                authorization,
                            );
                        }),
                );
            }
            WsInboundEvent::Send(event) => {
                let hub = self.hub.clone();
                let connection_id = self.session.id();
                let send_ctx = self.session.send_context();
                actix::spawn(async move {
                    let _ = hub.ingest(connection_id, send_ctx, event).await;
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            connection_id = %self.session.id(),
            user_id = %self.session.user_id(),
            "WebSocket session started"
        );

        self.hb(ctx);

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            connection_id = %self.session.id(),
            user_id = %self.session.user_id(),
            room = ?self.session.joined_room(),
            "WebSocket session stopped"
        );
        self.session.close();
    }
}

// Payloads broadcast to this connection's room
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, payload: String, ctx: &mut Self::Context) {
        ctx.text(payload);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!(
                    connection_id = %self.session.id(),
                    "Binary WebSocket messages not supported"
                );
                crate::metrics::event_dropped("binary_frame");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(connection_id = %self.session.id(), ?reason, "WebSocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(connection_id = %self.session.id(), error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let token = query.token.as_deref().or_else(|| bearer_token(&req));

    let claims = match token.map(|t| state.tokens.verify(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(_)) => {
            tracing::warn!("WebSocket connection rejected: invalid access token");
            return Ok(HttpResponse::Unauthorized().finish());
        }
        None => {
            tracing::warn!("WebSocket connection rejected: no access token");
            return Ok(HttpResponse::Unauthorized().finish());
        }
    };

    let (session, outbound) = state.hub.open_session(claims.user_id);
    let actor = WsSession::new(
        session,
        state.hub.clone(),
        &state.config.websocket,
        outbound,
    );

    ws::start(actor, &req, stream)
}
