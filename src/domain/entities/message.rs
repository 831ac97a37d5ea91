//! Message entity and repository trait.
//!
//! Maps to the `messages` and `message_receipts` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Kind of content carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl ContentType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Self::Image,
            "file" => Self::File,
            "system" => Self::System,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File attached to a message. Upload handling lives elsewhere; only the
/// stored reference travels with the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
}

/// Body of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageContent {
    #[serde(default)]
    pub text: String,

    #[serde(rename = "type", default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A delivered/read acknowledgement by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Receipts unique on `user_id`; the first acknowledgement wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "Vec<Receipt>", into = "Vec<Receipt>")]
pub struct ReceiptSet(Vec<Receipt>);

impl ReceiptSet {
    /// Adds a receipt unless the user already has one. Returns whether the set changed.
    pub fn insert(&mut self, user_id: Uuid, timestamp: DateTime<Utc>) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.0.push(Receipt { user_id, timestamp });
        true
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.0.iter().any(|r| r.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.0.iter()
    }
}

impl From<Vec<Receipt>> for ReceiptSet {
    fn from(receipts: Vec<Receipt>) -> Self {
        receipts.into_iter().collect()
    }
}

impl From<ReceiptSet> for Vec<Receipt> {
    fn from(set: ReceiptSet) -> Self {
        set.0
    }
}

impl FromIterator<Receipt> for ReceiptSet {
    fn from_iter<I: IntoIterator<Item = Receipt>>(iter: I) -> Self {
        let mut set = ReceiptSet::default();
        for receipt in iter {
            set.insert(receipt.user_id, receipt.timestamp);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageStatus {
    pub delivered: ReceiptSet,
    pub read: ReceiptSet,
}

/// Represents a persisted message in a conversation.
///
/// Maps to the `messages` table:
/// - id: UUID PRIMARY KEY
/// - conversation_id: UUID NOT NULL REFERENCES conversations(id)
/// - sender_id: UUID NOT NULL REFERENCES users(id)
/// - text: TEXT NOT NULL DEFAULT ''
/// - content_type: VARCHAR(16) NOT NULL DEFAULT 'text'
/// - attachments: JSONB NOT NULL DEFAULT '[]'
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - edited_at / deleted_at: TIMESTAMPTZ NULL
///
/// Receipts live in `message_receipts` keyed by (message_id, user_id, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Builds an unsaved message. Ids are time-ordered so that store
    /// ordering and id ordering agree.
    pub fn new(conversation_id: Uuid, sender_id: Uuid, content: MessageContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id,
            content,
            status: MessageStatus::default(),
            created_at: now,
            updated_at: now,
            edited_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.status.read.contains(user_id)
    }
}

/// Fields required to persist a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: MessageContent,
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Durably append a message. Returns the stored row once the write is confirmed.
    async fn create(&self, message: NewMessage) -> Result<Message, AppError>;

    /// One page of a conversation, newest first. `page` is 1-based.
    async fn find_by_conversation(
        &self,
        conversation_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, AppError>;

    /// Add a read receipt for `user_id` on every message of the conversation
    /// that does not carry one yet. Returns how many messages changed.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}
