//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::application::services::message_service::{MessageQueryDto, MAX_PAGE_SIZE, MAX_TEXT_LENGTH};
use crate::domain::{Attachment, ContentType, MessageContent};

/// `length` bounds are compared as `u64`.
const MAX_TEXT_CHARS: u64 = MAX_TEXT_LENGTH as u64;

/// Send message request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(max = MAX_TEXT_CHARS, message = "Message text is too long"))]
    pub text: Option<String>,

    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,

    pub attachments: Option<Vec<Attachment>>,
}

impl SendMessageRequest {
    /// Missing fields fall back to empty text of type `text`.
    pub fn into_content(self) -> MessageContent {
        MessageContent {
            text: self.text.unwrap_or_default(),
            content_type: self.content_type.unwrap_or_default(),
            attachments: self.attachments.unwrap_or_default(),
        }
    }
}

/// History query string
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MessagesQuery {
    #[validate(range(min = 1, message = "Page starts at 1"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = MAX_PAGE_SIZE, message = "Limit must be 1-100"))]
    pub limit: Option<u32>,
}

impl From<MessagesQuery> for MessageQueryDto {
    fn from(query: MessagesQuery) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
        }
    }
}
