//! # Chat Relay Library
//!
//! Real-time message distribution for a horizontally scaled chat service:
//! - WebSocket gateway with per-instance room membership
//! - Persist-then-distribute message ingest
//! - Cross-instance fan-out over a shared Redis pub/sub channel with
//!   origin-based loop suppression
//! - Instance-local typing indicators, presence and read receipts
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities and repository traits
//! - **Application Layer**: Message, presence and authentication services
//! - **Infrastructure Layer**: PostgreSQL repositories, event bus, metrics
//! - **Presentation Layer**: HTTP handlers, WebSocket gateway and fan-out
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities and repository traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, bus and metrics implementations
//! +-- presentation/   HTTP routes, WebSocket gateway, fan-out engine
//! +-- shared/         Common error type
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
