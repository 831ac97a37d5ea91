//! WebSocket Message Types
//!
//! JSON frames exchanged with clients. Every frame is an object whose `type`
//! field names the event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::services::MessageDto;
use crate::domain::MessageContent;

/// Incoming client event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Subscribe this session to conversation rooms
    JoinRooms { conversation_ids: Vec<Uuid> },

    /// Submit a message to a conversation
    SendMessage {
        conversation_id: Uuid,
        #[serde(default)]
        content: MessageContent,
    },

    TypingStart { conversation_id: Uuid },

    TypingStop { conversation_id: Uuid },

    /// Mark every message of the conversation read by this user
    MarkRead { conversation_id: Uuid },
}

/// Outgoing server event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent once after the session is admitted
    Ready { session_id: Uuid, user_id: Uuid },

    NewMessage { data: MessageDto },

    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    UserStopTyping { conversation_id: Uuid, user_id: Uuid },

    /// Failure of a request made by this session only
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => "ready",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStopTyping { .. } => "user_stop_typing",
            ServerEvent::Error { .. } => "error",
        }
    }
}
