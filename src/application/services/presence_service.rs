//! Presence Service
//!
//! Durable side of presence: the online/offline flag on the user record and
//! read receipts. Transient typing signals never reach this service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{MessageRepository, UserRepository, UserStatus};

#[async_trait]
pub trait PresenceService: Send + Sync {
    /// Persist a user's presence status.
    async fn set_presence(&self, user_id: Uuid, status: UserStatus) -> Result<(), PresenceError>;

    /// Record that `user_id` has read the conversation. Repeating the call
    /// adds nothing. Returns the number of messages newly marked.
    async fn mark_as_read(&self, conversation_id: Uuid, user_id: Uuid)
        -> Result<u64, PresenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Storage error: {0}")]
    Store(String),
}

pub struct PresenceServiceImpl<M, U>
where
    M: MessageRepository,
    U: UserRepository,
{
    message_repo: Arc<M>,
    user_repo: Arc<U>,
}

impl<M, U> PresenceServiceImpl<M, U>
where
    M: MessageRepository,
    U: UserRepository,
{
    pub fn new(message_repo: Arc<M>, user_repo: Arc<U>) -> Self {
        Self {
            message_repo,
            user_repo,
        }
    }
}

#[async_trait]
impl<M, U> PresenceService for PresenceServiceImpl<M, U>
where
    M: MessageRepository + 'static,
    U: UserRepository + 'static,
{
    async fn set_presence(&self, user_id: Uuid, status: UserStatus) -> Result<(), PresenceError> {
        self.user_repo
            .update_status(user_id, status)
            .await
            .map_err(|e| PresenceError::Store(e.to_string()))?;

        debug!(user_id = %user_id, status = %status, "Presence updated");
        Ok(())
    }

    async fn mark_as_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, PresenceError> {
        let marked = self
            .message_repo
            .mark_read(conversation_id, user_id, Utc::now())
            .await
            .map_err(|e| PresenceError::Store(e.to_string()))?;

        debug!(conversation_id = %conversation_id, marked, "Read receipts recorded");
        Ok(marked)
    }
}
