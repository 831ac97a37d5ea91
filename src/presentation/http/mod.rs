//! HTTP API
//!
//! REST routes for history and message submission, plus health and metrics.

pub mod handlers;
pub mod routes;
