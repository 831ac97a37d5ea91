//! WebSocket Connection Handler
//!
//! Authenticates the upgrade request, then runs one task per connection that
//! reads client events in order and writes queued server events.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use super::messages::{ClientEvent, ServerEvent};
use super::relay;
use super::session::{SessionHandle, SessionState};
use crate::domain::Identity;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Query string accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Bearer token from the `Authorization` header, falling back to `?token=`.
pub fn connection_credential(headers: &HeaderMap, params: &ConnectParams) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| params.token.clone())
}

/// WebSocket upgrade handler. Unauthenticated requests are answered with 401
/// and never upgraded.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Response {
    let mut lifecycle = SessionState::Connecting;
    let credential = connection_credential(&headers, &params);

    let identity = match state.gateway.authenticate(credential.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = lifecycle.transition(SessionState::Rejected);
            tracing::debug!(error = %e, state = ?lifecycle, "Connection rejected");
            return AppError::Unauthorized(e.to_string()).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (session, mut outbound) = state.gateway.open_session(identity);
    let session_id = session.id;

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Spawn task to forward queued events to the WebSocket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(kind = event.kind(), "Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    state.gateway.send_to_session(
        session_id,
        ServerEvent::Ready {
            session_id,
            user_id: session.identity.user_id,
        },
    );

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch_frame(text.as_str(), &session, &state).await,
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, "Connection closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup
    state.gateway.disconnect(session_id);
    sender_task.abort();
}

/// Handle one text frame from `session`. A failure is reported to that
/// session only, as an `error` event.
pub async fn dispatch_frame(text: &str, session: &SessionHandle, state: &AppState) {
    if let Err(message) = handle_client_event(text, session, state).await {
        tracing::debug!(session_id = %session.id, error = %message, "Request failed");
        state
            .gateway
            .send_to_session(session.id, ServerEvent::error(message));
    }
}

async fn handle_client_event(
    text: &str,
    session: &SessionHandle,
    state: &AppState,
) -> Result<(), String> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|e| format!("Invalid event: {}", e))?;

    match event {
        ClientEvent::JoinRooms { conversation_ids } => {
            state
                .gateway
                .join_rooms(session.id, &conversation_ids)
                .map_err(|e| e.to_string())?;
        }

        ClientEvent::SendMessage {
            conversation_id,
            content,
        } => {
            state
                .message_service
                .submit(conversation_id, session.identity.user_id, content)
                .await
                .map_err(|e| e.client_message())?;
        }

        ClientEvent::TypingStart { conversation_id } => {
            relay::start_typing(&state.gateway, session, conversation_id);
        }

        ClientEvent::TypingStop { conversation_id } => {
            relay::stop_typing(&state.gateway, session, conversation_id);
        }

        ClientEvent::MarkRead { conversation_id } => {
            state
                .presence_service
                .mark_as_read(conversation_id, session.identity.user_id)
                .await
                .map_err(|_| "Read receipt could not be saved".to_string())?;
        }
    }

    Ok(())
}
