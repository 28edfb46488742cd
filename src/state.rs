use crate::{
    config::Config, middleware::auth::TokenVerifier, services::SharedStore, websocket::ChatHub,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub hub: ChatHub,
    pub tokens: TokenVerifier,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: SharedStore) -> Self {
        Self {
            hub: ChatHub::new(store.clone(), config.join_policy),
            tokens: TokenVerifier::new(&config.access_token_secret),
            store,
            config,
        }
    }
}
