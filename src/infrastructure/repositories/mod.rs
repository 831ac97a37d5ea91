//! Repository Implementations
//!
//! PostgreSQL implementations of the domain repository traits.
//!
//! ## Available Repositories
//!
//! - **MessageRepository** - Message append, page-based history, read receipts
//! - **ConversationRepository** - Conversation lookup and last-message summary
//! - **UserRepository** - Sender display fields and presence status
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use chat_relay::infrastructure::repositories::{
//!     PgConversationRepository, PgMessageRepository, PgUserRepository,
//! };
//!
//! fn setup_repositories(pool: PgPool) {
//!     let messages = PgMessageRepository::new(pool.clone());
//!     let conversations = PgConversationRepository::new(pool.clone());
//!     let users = PgUserRepository::new(pool);
//! }
//! ```

pub mod conversation_repository;
pub mod message_repository;
pub mod user_repository;

pub use conversation_repository::PgConversationRepository;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;
