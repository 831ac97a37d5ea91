//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the database schema and domain User entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{User, UserRepository, UserStatus};
use crate::shared::error::AppError;

/// Database row representation matching the users table schema.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    avatar: Option<String>,
    status: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Convert database row to domain User entity.
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            avatar: self.avatar,
            status: UserStatus::from_str(&self.status),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, avatar, status, is_active,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    /// Update presence status. The `IS DISTINCT FROM` guard keeps repeated
    /// writes of the same status from touching `updated_at`.
    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status IS DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
