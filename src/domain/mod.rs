//! # Domain Layer
//!
//! The domain layer contains the entities of the chat backend and the
//! persistence ports the real-time core consumes. It is independent of any
//! external frameworks or infrastructure concerns.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;

// Re-export commonly used types
pub use entities::*;
