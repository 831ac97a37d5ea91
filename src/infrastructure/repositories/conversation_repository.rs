//! Conversation Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Conversation, ConversationRepository, ConversationType, LastMessage};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    conversation_type: String,
    name: Option<String>,
    is_active: bool,
    last_message_content: Option<String>,
    last_message_sender: Option<Uuid>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self) -> Conversation {
        let last_message = match (self.last_message_sender, self.last_message_at) {
            (Some(sender_id), Some(timestamp)) => Some(LastMessage {
                content: self.last_message_content.unwrap_or_default(),
                sender_id,
                timestamp,
            }),
            _ => None,
        };

        Conversation {
            id: self.id,
            conversation_type: ConversationType::from_str(&self.conversation_type),
            name: self.name,
            is_active: self.is_active,
            last_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL conversation repository implementation.
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, conversation_type, name, is_active,
                   last_message_content, last_message_sender, last_message_at,
                   created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_conversation()))
    }

    async fn update_last_message(&self, id: Uuid, summary: LastMessage) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_content = $2,
                last_message_sender = $3,
                last_message_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&summary.content)
        .bind(summary.sender_id)
        .bind(summary.timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Conversation not found".into()));
        }

        Ok(())
    }
}
