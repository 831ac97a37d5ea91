//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Cross-instance event bus (Redis pub/sub, in-process)
//! - Prometheus metrics

pub mod bus;
pub mod database;
pub mod metrics;
pub mod repositories;
