//! Typing indicators
//!
//! Ephemeral signals relayed to other sessions in the same room on this
//! instance. Nothing is stored and nothing crosses the bus.

use uuid::Uuid;

use super::gateway::Gateway;
use super::messages::ServerEvent;
use super::session::SessionHandle;

/// Tell the rest of the room that `session`'s user started typing.
pub fn start_typing(gateway: &Gateway, session: &SessionHandle, conversation_id: Uuid) -> usize {
    let event = ServerEvent::UserTyping {
        conversation_id,
        user_id: session.identity.user_id,
        username: session.identity.username.clone(),
    };
    gateway.broadcast_to_room(conversation_id, &event, Some(session.id))
}

pub fn stop_typing(gateway: &Gateway, session: &SessionHandle, conversation_id: Uuid) -> usize {
    let event = ServerEvent::UserStopTyping {
        conversation_id,
        user_id: session.identity.user_id,
    };
    gateway.broadcast_to_room(conversation_id, &event, Some(session.id))
}
