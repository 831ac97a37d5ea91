//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Presence status matching database VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Offline,
    Online,
    Away,
}

impl UserStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" => Self::Online,
            "away" => Self::Away,
            _ => Self::Offline,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Away => "away",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: UUID PRIMARY KEY
/// - username: VARCHAR(20) NOT NULL UNIQUE
/// - display_name: VARCHAR(64) NULL
/// - avatar: TEXT NULL
/// - status: VARCHAR(16) NOT NULL DEFAULT 'offline'
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// Credentials and registration belong to the account service and are not
/// loaded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            display_name: None,
            avatar: None,
            status: UserStatus::Offline,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the display name or fall back to username.
    pub fn effective_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Who is on the other end of an admitted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Repository trait for User data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Set the presence status. Writing the current value again is a no-op.
    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), AppError>;
}
