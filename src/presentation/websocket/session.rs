//! WebSocket Session Management

use uuid::Uuid;

use crate::domain::Identity;

pub type SessionId = Uuid;

/// Lifecycle of one client connection.
///
/// `Connecting -> Open | Rejected`, `Open -> Closed`. `Rejected` and
/// `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Rejected,
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid session transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    /// Move to `next`, refusing anything the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (*self, next),
            (SessionState::Connecting, SessionState::Open)
                | (SessionState::Connecting, SessionState::Rejected)
                | (SessionState::Open, SessionState::Closed)
        );

        if !allowed {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }

        *self = next;
        Ok(())
    }
}

/// What the connection task holds for an admitted session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub identity: Identity,
}
