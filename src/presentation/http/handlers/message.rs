//! Message Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::request::{MessagesQuery, SendMessageRequest};
use crate::application::dto::response::{
    MarkReadResponse, MessageListResponse, SendMessageResponse,
};
use crate::application::services::MessageError;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

fn map_message_error(e: MessageError) -> AppError {
    match e {
        MessageError::ConversationNotFound => AppError::NotFound("Conversation not found".into()),
        MessageError::Validation(msg) => AppError::Validation(msg),
        MessageError::Store(msg) => AppError::Internal(msg),
    }
}

/// Get one page of conversation history, oldest first
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessageListResponse>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let messages = state
        .message_service
        .get_messages(conversation_id, query.into())
        .await
        .map_err(map_message_error)?;

    Ok(Json(MessageListResponse::from(messages)))
}

/// Send message to a conversation. Delivery to connected sessions follows
/// the same path as a WebSocket `send_message`.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let message = state
        .message_service
        .submit(conversation_id, auth.user_id, body.into_content())
        .await
        .map_err(map_message_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            success: true,
            message,
        }),
    ))
}

/// Mark the conversation read for the caller
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let marked = state
        .presence_service
        .mark_as_read(conversation_id, auth.user_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(MarkReadResponse {
        success: true,
        marked,
    }))
}
