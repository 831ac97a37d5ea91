//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **MessageService**: Ingest, persistence and history of chat messages
//! - **PresenceService**: Durable presence status and read receipts
//! - **TokenVerifier**: Connection-time authentication

pub mod auth_service;
pub mod message_service;
pub mod presence_service;

pub use auth_service::{AuthError, Claims, JwtTokenVerifier, TokenVerifier};

pub use message_service::{
    MessageDistributor, MessageDto, MessageError, MessageQueryDto, MessageService,
    MessageServiceImpl, SenderDto,
};

pub use presence_service::{PresenceError, PresenceService, PresenceServiceImpl};
