//! Request guards that resolve the caller before a handler runs

use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Authenticated user, taken from the bearer token
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let claims = match req.app_data::<web::Data<AppState>>() {
            Some(state) => bearer_token(req)
                .ok_or(AppError::Unauthorized)
                .and_then(|token| state.tokens.verify(token)),
            None => {
                tracing::error!("AppState missing from app data");
                Err(AppError::Internal)
            }
        };

        Box::pin(async move {
            let claims = claims?;
            Ok(User {
                id: claims.user_id,
                username: claims.username,
            })
        })
    }
}
