//! WebSocket Gateway
//!
//! Owns every session on this instance and the room membership index.
//! Fan-out and the typing relay only read from it.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::ServerEvent;
use super::session::{SessionHandle, SessionId, SessionState};
use crate::application::services::{AuthError, PresenceService, TokenVerifier};
use crate::domain::{Identity, UserStatus};
use crate::infrastructure::metrics;

/// Connected session with message sender
pub struct ConnectedSession {
    pub identity: Identity,
    state: Mutex<SessionState>,
    rooms: Mutex<HashSet<Uuid>>,
    sender: mpsc::UnboundedSender<ServerEvent>,
    /// Online write still in flight; the offline write waits for it.
    online_write: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectedSession {
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn rooms(&self) -> HashSet<Uuid> {
        self.rooms.lock().clone()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Session is not open")]
    SessionNotOpen,
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Open sessions by id
    sessions: DashMap<SessionId, Arc<ConnectedSession>>,
    /// Conversation id to member session ids
    rooms: DashMap<Uuid, HashSet<SessionId>>,
    verifier: Arc<dyn TokenVerifier>,
    presence: Arc<dyn PresenceService>,
}

impl Gateway {
    pub fn new(verifier: Arc<dyn TokenVerifier>, presence: Arc<dyn PresenceService>) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            verifier,
            presence,
        }
    }

    /// Validate a connection credential. A missing or blank credential is
    /// rejected without consulting the verifier.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        self.verifier.verify(token).await
    }

    /// Admit an authenticated connection. Returns the handle and the queue
    /// of events to write to the socket.
    pub fn open_session(
        &self,
        identity: Identity,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let online_write = self.spawn_presence(identity.user_id, UserStatus::Online, None);
        let session = Arc::new(ConnectedSession {
            identity: identity.clone(),
            state: Mutex::new(SessionState::Open),
            rooms: Mutex::new(HashSet::new()),
            sender: tx,
            online_write: Mutex::new(Some(online_write)),
        });
        self.sessions.insert(id, session);
        metrics::set_sessions_active(self.sessions.len());

        info!(
            user_id = %identity.user_id,
            session_id = %id,
            "Session opened"
        );

        (SessionHandle { id, identity }, rx)
    }

    /// Subscribe a session to rooms. Joining a room twice is a no-op.
    /// Returns how many rooms were newly joined.
    pub fn join_rooms(
        &self,
        session_id: SessionId,
        conversation_ids: &[Uuid],
    ) -> Result<usize, GatewayError> {
        let session = self
            .session(session_id)
            .ok_or(GatewayError::SessionNotOpen)?;

        // Held across the index update so a concurrent disconnect sees every room.
        let state = session.state.lock();
        if *state != SessionState::Open {
            return Err(GatewayError::SessionNotOpen);
        }

        let mut rooms = session.rooms.lock();
        let mut joined = 0;
        for &conversation_id in conversation_ids {
            if rooms.insert(conversation_id) {
                self.rooms
                    .entry(conversation_id)
                    .or_default()
                    .insert(session_id);
                joined += 1;
            }
        }

        debug!(session_id = %session_id, joined, "Rooms joined");
        Ok(joined)
    }

    /// Close a session and drop it from every room. Only the first call for
    /// a session has any effect; it returns the identity that left.
    pub fn disconnect(&self, session_id: SessionId) -> Option<Identity> {
        let (_, session) = self.sessions.remove(&session_id)?;

        {
            let mut state = session.state.lock();
            if let Err(e) = state.transition(SessionState::Closed) {
                warn!(session_id = %session_id, error = %e, "Unexpected session state");
                return None;
            }

            for conversation_id in session.rooms.lock().drain() {
                if let Some(mut members) = self.rooms.get_mut(&conversation_id) {
                    members.remove(&session_id);
                }
                self.rooms
                    .remove_if(&conversation_id, |_, members| members.is_empty());
            }
        }

        metrics::set_sessions_active(self.sessions.len());
        info!(
            user_id = %session.identity.user_id,
            session_id = %session_id,
            "Session closed"
        );

        let online_write = session.online_write.lock().take();
        self.spawn_presence(session.identity.user_id, UserStatus::Offline, online_write);

        Some(session.identity.clone())
    }

    /// Queue an event for one session.
    pub fn send_to_session(&self, session_id: SessionId, event: ServerEvent) -> bool {
        match self.session(session_id) {
            Some(session) => session.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Queue an event for every member of a room, optionally skipping one
    /// session. Returns how many sessions accepted it.
    pub fn broadcast_to_room(
        &self,
        conversation_id: Uuid,
        event: &ServerEvent,
        except: Option<SessionId>,
    ) -> usize {
        let mut delivered = 0;
        for session_id in self.room_members(conversation_id) {
            if Some(session_id) == except {
                continue;
            }
            if self.send_to_session(session_id, event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Sessions currently joined to a room.
    pub fn room_members(&self, conversation_id: Uuid) -> Vec<SessionId> {
        self.rooms
            .get(&conversation_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn session(&self, session_id: SessionId) -> Option<Arc<ConnectedSession>> {
        self.sessions.get(&session_id).map(|s| Arc::clone(s.value()))
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Presence writes are best-effort and never hold up the connection.
    /// A write runs only after `after` has finished.
    fn spawn_presence(
        &self,
        user_id: Uuid,
        status: UserStatus,
        after: Option<JoinHandle<()>>,
    ) -> JoinHandle<()> {
        let presence = Arc::clone(&self.presence);
        tokio::spawn(async move {
            if let Some(previous) = after {
                let _ = previous.await;
            }
            if let Err(e) = presence.set_presence(user_id, status).await {
                warn!(user_id = %user_id, status = %status, error = %e, "Presence update failed");
            }
        })
    }
}
