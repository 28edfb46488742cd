use crate::error::AppError;
use actix_web::web;

pub mod messages;
pub mod wsroute;

/// Register every HTTP and WebSocket route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(wsroute::ws_handler)
    .service(messages::get_messages)
    .route("/health", web::get().to(|| async { "OK" }))
    .route("/metrics", web::get().to(crate::metrics::metrics_handler));
}
