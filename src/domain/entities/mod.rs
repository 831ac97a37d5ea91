//! # Domain Entities
//!
//! Core domain entities touched by the real-time message path.
//!
//! - **Message**: a persisted message with content and read/delivered receipts
//! - **Conversation**: the broadcast target; its id is the room id
//! - **User**: sender display fields and presence status
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod conversation;
mod message;
mod user;

pub use conversation::{Conversation, ConversationRepository, ConversationType, LastMessage};
pub use message::{
    Attachment, ContentType, Message, MessageContent, MessageRepository, MessageStatus,
    NewMessage, Receipt, ReceiptSet,
};
pub use user::{Identity, User, UserRepository, UserStatus};

#[cfg(test)]
pub use conversation::MockConversationRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use user::MockUserRepository;
