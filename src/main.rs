use actix_web::{http::header, web, App, HttpServer};
use chat_fanout_service::{
    config::{self, StoreBackend},
    db, error, logging, routes,
    services::{InMemoryMessageStore, PgMessageStore, SharedStore},
    state::AppState,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let store: SharedStore = match cfg.store_backend {
        StoreBackend::Postgres => {
            let database_url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| error::AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(database_url, cfg.db_max_connections)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            Arc::new(PgMessageStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store: messages are lost on restart");
            Arc::new(InMemoryMessageStore::new())
        }
    };

    let state = AppState::new(cfg.clone(), store);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(
        %bind_addr,
        join_policy = ?cfg.join_policy,
        store_backend = ?cfg.store_backend,
        "starting chat-fanout-service"
    );

    let allowed_origin = cfg.cors_allowed_origin.clone();
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind REST: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("REST server: {e}")))
}
