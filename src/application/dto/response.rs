//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::MessageDto;

/// One page of conversation history
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub success: bool,
    pub messages: Vec<MessageDto>,
}

impl From<Vec<MessageDto>> for MessageListResponse {
    fn from(messages: Vec<MessageDto>) -> Self {
        Self {
            success: true,
            messages,
        }
    }
}

/// Stored message returned to the REST sender
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: MessageDto,
}

/// Read receipt result
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub marked: u64,
}
