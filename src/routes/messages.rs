use crate::error::AppError;
use crate::middleware::guards::User;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use uuid::Uuid;

/// History of one conversation, oldest first. Members only.
#[get("/conversations/{id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();

    let conversation = state
        .store
        .find_conversation(conversation_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !conversation.has_member(user.id) {
        tracing::warn!(user_id = %user.id, %conversation_id, "history denied to non-member");
        return Err(AppError::Forbidden);
    }

    let messages = state.store.list_messages(conversation_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}
