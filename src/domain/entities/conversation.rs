//! Conversation entity and repository trait.
//!
//! Maps to the `conversations` and `conversation_participants` tables.
//! Only the parts the message path reads or writes are modelled here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    #[default]
    Direct,
    Group,
    Helpline,
}

impl ConversationType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "group" => Self::Group,
            "helpline" => Self::Helpline,
            _ => Self::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Helpline => "helpline",
        }
    }
}

/// Cached summary of the newest message, written after the message itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub sender_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// A conversation. Its id doubles as the room id on every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub name: Option<String>,
    pub is_active: bool,
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(conversation_type: ConversationType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            conversation_type,
            name: None,
            is_active: true,
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for Conversation data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError>;

    /// Overwrite the cached last-message summary.
    async fn update_last_message(&self, id: Uuid, summary: LastMessage) -> Result<(), AppError>;
}
