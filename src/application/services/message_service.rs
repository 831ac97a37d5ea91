//! Message Service
//!
//! Ingest side of the real-time path: validates an outbound message, stores
//! it, refreshes the conversation summary, and only then hands it to the
//! distributor. History reads go through the same service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    ConversationRepository, LastMessage, Message, MessageContent, MessageRepository,
    MessageStatus, NewMessage, User, UserRepository,
};

/// Longest accepted message text, in characters.
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Default and maximum page sizes for history reads.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Persist a message and distribute it. Nothing is distributed unless the
    /// store confirmed the write.
    async fn submit(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: MessageContent,
    ) -> Result<MessageDto, MessageError>;

    /// One page of history, oldest first.
    async fn get_messages(
        &self,
        conversation_id: Uuid,
        query: MessageQueryDto,
    ) -> Result<Vec<MessageDto>, MessageError>;
}

/// Receives messages after they are durably stored.
#[async_trait]
pub trait MessageDistributor: Send + Sync {
    async fn distribute(&self, message: &MessageDto);
}

/// Sender display fields resolved from the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderDto {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl SenderDto {
    fn unresolved(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            display_name: None,
            avatar: None,
        }
    }
}

impl From<&User> for SenderDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: Some(user.username.clone()),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Message as clients and sibling instances see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: SenderDto,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MessageDto {
    pub fn from_parts(message: Message, sender: SenderDto) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender,
            content: message.content,
            status: message.status,
            created_at: message.created_at,
            updated_at: message.updated_at,
            edited_at: message.edited_at,
            deleted_at: message.deleted_at,
        }
    }
}

/// Message query parameters
#[derive(Debug, Clone, Default)]
pub struct MessageQueryDto {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl MessageQueryDto {
    /// Page (1-based) and limit after applying defaults and bounds.
    pub fn resolve(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl MessageError {
    /// Text safe to show the sender.
    pub fn client_message(&self) -> String {
        match self {
            MessageError::ConversationNotFound => "Conversation not found".into(),
            MessageError::Validation(msg) => msg.clone(),
            MessageError::Store(_) => "Message could not be saved".into(),
        }
    }
}

/// MessageService implementation
pub struct MessageServiceImpl<M, C, U>
where
    M: MessageRepository,
    C: ConversationRepository,
    U: UserRepository,
{
    message_repo: Arc<M>,
    conversation_repo: Arc<C>,
    user_repo: Arc<U>,
    distributor: Arc<dyn MessageDistributor>,
}

impl<M, C, U> MessageServiceImpl<M, C, U>
where
    M: MessageRepository,
    C: ConversationRepository,
    U: UserRepository,
{
    pub fn new(
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        user_repo: Arc<U>,
        distributor: Arc<dyn MessageDistributor>,
    ) -> Self {
        Self {
            message_repo,
            conversation_repo,
            user_repo,
            distributor,
        }
    }

    fn validate(content: &MessageContent) -> Result<(), MessageError> {
        if content.text.chars().count() > MAX_TEXT_LENGTH {
            return Err(MessageError::Validation(format!(
                "Message text exceeds {} characters",
                MAX_TEXT_LENGTH
            )));
        }
        Ok(())
    }

    /// Sender lookup never fails the caller; the id alone is enough to render.
    async fn resolve_sender(&self, sender_id: Uuid) -> SenderDto {
        match self.user_repo.find_by_id(sender_id).await {
            Ok(Some(user)) => SenderDto::from(&user),
            Ok(None) => SenderDto::unresolved(sender_id),
            Err(e) => {
                warn!(sender_id = %sender_id, error = %e, "Sender lookup failed");
                SenderDto::unresolved(sender_id)
            }
        }
    }
}

#[async_trait]
impl<M, C, U> MessageService for MessageServiceImpl<M, C, U>
where
    M: MessageRepository + 'static,
    C: ConversationRepository + 'static,
    U: UserRepository + 'static,
{
    #[instrument(skip(self, content), fields(message_id))]
    async fn submit(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: MessageContent,
    ) -> Result<MessageDto, MessageError> {
        Self::validate(&content)?;

        let conversation = self
            .conversation_repo
            .find_by_id(conversation_id)
            .await
            .map_err(|e| MessageError::Store(e.to_string()))?
            .ok_or(MessageError::ConversationNotFound)?;

        let message = self
            .message_repo
            .create(NewMessage {
                conversation_id: conversation.id,
                sender_id,
                content,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Message write failed, nothing distributed");
                MessageError::Store(e.to_string())
            })?;
        tracing::Span::current().record("message_id", tracing::field::display(message.id));

        let summary = LastMessage {
            content: message.content.text.clone(),
            sender_id,
            timestamp: message.created_at,
        };
        if let Err(e) = self
            .conversation_repo
            .update_last_message(conversation.id, summary)
            .await
        {
            warn!(error = %e, "Conversation summary not updated");
        }

        let sender = self.resolve_sender(sender_id).await;
        let dto = MessageDto::from_parts(message, sender);

        self.distributor.distribute(&dto).await;
        debug!("Message stored and distributed");

        Ok(dto)
    }

    async fn get_messages(
        &self,
        conversation_id: Uuid,
        query: MessageQueryDto,
    ) -> Result<Vec<MessageDto>, MessageError> {
        let (page, limit) = query.resolve();

        let conversation = self
            .conversation_repo
            .find_by_id(conversation_id)
            .await
            .map_err(|e| MessageError::Store(e.to_string()))?;
        if conversation.is_none() {
            return Err(MessageError::ConversationNotFound);
        }

        let mut messages = self
            .message_repo
            .find_by_conversation(conversation_id, page, limit)
            .await
            .map_err(|e| MessageError::Store(e.to_string()))?;
        // Store pages newest first; display order is oldest first.
        messages.reverse();

        let mut senders: HashMap<Uuid, SenderDto> = HashMap::new();
        let mut result = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = match senders.get(&message.sender_id) {
                Some(sender) => sender.clone(),
                None => {
                    let sender = self.resolve_sender(message.sender_id).await;
                    senders.insert(message.sender_id, sender.clone());
                    sender
                }
            };
            result.push(MessageDto::from_parts(message, sender));
        }

        Ok(result)
    }
}
