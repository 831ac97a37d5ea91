//! Message Repository Implementation
//!
//! PostgreSQL implementation of message storage, page-based history and
//! read receipts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Attachment, ContentType, Message, MessageContent, MessageRepository, MessageStatus,
    NewMessage,
};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_receipts(
        &self,
        message_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, MessageStatus>, AppError> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT message_id, user_id, kind, at
            FROM message_receipts
            WHERE message_id = ANY($1)
            ORDER BY at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut statuses: HashMap<Uuid, MessageStatus> = HashMap::new();
        for row in rows {
            let status = statuses.entry(row.message_id).or_default();
            let set = match row.kind.as_str() {
                "delivered" => &mut status.delivered,
                _ => &mut status.read,
            };
            set.insert(row.user_id, row.at);
        }
        Ok(statuses)
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    text: String,
    content_type: String,
    attachments: Json<Vec<Attachment>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self, status: MessageStatus) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: MessageContent {
                text: self.text,
                content_type: ContentType::from_str(&self.content_type),
                attachments: self.attachments.0,
            },
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    message_id: Uuid,
    user_id: Uuid,
    kind: String,
    at: DateTime<Utc>,
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    /// Insert a new message. Resolves only after Postgres acknowledges the row.
    async fn create(&self, message: NewMessage) -> Result<Message, AppError> {
        let draft = Message::new(message.conversation_id, message.sender_id, message.content);

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, text, content_type, attachments,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, conversation_id, sender_id, text, content_type, attachments,
                      created_at, updated_at, edited_at, deleted_at
            "#,
        )
        .bind(draft.id)
        .bind(draft.conversation_id)
        .bind(draft.sender_id)
        .bind(&draft.content.text)
        .bind(draft.content.content_type.as_str())
        .bind(Json(&draft.content.attachments))
        .bind(draft.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message(MessageStatus::default()))
    }

    /// Find one page of messages, newest first.
    async fn find_by_conversation(
        &self,
        conversation_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, AppError> {
        let limit = i64::from(limit.clamp(1, 100));
        let offset = i64::from(page.max(1) - 1) * limit;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, text, content_type, attachments,
                   created_at, updated_at, edited_at, deleted_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut statuses = self.load_receipts(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status = statuses.remove(&row.id).unwrap_or_default();
                row.into_message(status)
            })
            .collect())
    }

    /// Add a read receipt to every message in the conversation not yet read by the user.
    ///
    /// The receipts primary key makes repeated calls no-ops.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_receipts (message_id, user_id, kind, at)
            SELECT id, $2, 'read', $3
            FROM messages
            WHERE conversation_id = $1
            ON CONFLICT (message_id, user_id, kind) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
