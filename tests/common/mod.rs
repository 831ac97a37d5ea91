//! Common Test Utilities
//!
//! In-memory stores, settings fixtures and a helper that runs relay
//! instances in one process over linked in-memory buses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use chat_relay::application::services::JwtTokenVerifier;
use chat_relay::config::{
    BusKind, BusSettings, CorsSettings, DatabaseSettings, InstanceSettings, JwtSettings,
    LogSettings, RedisSettings, ServerSettings, Settings, WebSocketSettings,
};
use chat_relay::domain::{
    Conversation, ConversationRepository, ConversationType, LastMessage, Message,
    MessageRepository, NewMessage, User, UserRepository, UserStatus,
};
use chat_relay::infrastructure::bus::{EventBus, InMemoryEventBus};
use chat_relay::presentation::websocket::{ServerEvent, SessionHandle};
use chat_relay::shared::error::AppError;
use chat_relay::startup::{build_router, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-of-sufficient-length";

/// Settings for one in-process instance
pub fn test_settings(instance_id: &str) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        redis: RedisSettings {
            url: "redis://unused".into(),
        },
        bus: BusSettings {
            kind: BusKind::Memory,
            channel: "chat.messages".into(),
            reconnect_delay_ms: 10,
            dedup_window: 64,
        },
        instance: InstanceSettings {
            id: instance_id.into(),
        },
        jwt: JwtSettings {
            secret: TEST_JWT_SECRET.into(),
            expiry_minutes: 60,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
        },
        log: LogSettings::default(),
        environment: "test".into(),
    }
}

/// Shared in-memory stand-in for the three PostgreSQL stores.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    messages: Mutex<Vec<Message>>,
    status_writes: Mutex<Vec<(Uuid, UserStatus)>>,
    fail_message_writes: AtomicBool,
    fail_summary_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, username: &str) -> User {
        let user = User::new(username);
        self.users.lock().insert(user.id, user.clone());
        user
    }

    pub fn add_conversation(&self) -> Conversation {
        let conversation = Conversation::new(ConversationType::Group);
        self.conversations
            .lock()
            .insert(conversation.id, conversation.clone());
        conversation
    }

    pub fn conversation(&self, id: Uuid) -> Option<Conversation> {
        self.conversations.lock().get(&id).cloned()
    }

    pub fn messages_in(&self, conversation_id: Uuid) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn status_writes_for(&self, user_id: Uuid, status: UserStatus) -> usize {
        self.status_writes
            .lock()
            .iter()
            .filter(|(id, s)| *id == user_id && *s == status)
            .count()
    }

    pub fn fail_message_writes(&self) {
        self.fail_message_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_summary_writes(&self) {
        self.fail_summary_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<Message, AppError> {
        if self.fail_message_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("message store unavailable".into()));
        }
        let message = Message::new(message.conversation_id, message.sender_id, message.content);
        self.messages.lock().push(message.clone());
        Ok(message)
    }

    async fn find_by_conversation(
        &self,
        conversation_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, AppError> {
        let mut messages = self.messages_in(conversation_id);
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let skip = (page.saturating_sub(1) * limit) as usize;
        Ok(messages.into_iter().skip(skip).take(limit as usize).collect())
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut marked = 0;
        for message in self
            .messages
            .lock()
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id)
        {
            if message.status.read.insert(user_id, at) {
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        Ok(self.conversation(id))
    }

    async fn update_last_message(&self, id: Uuid, summary: LastMessage) -> Result<(), AppError> {
        if self.fail_summary_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("summary write timed out".into()));
        }
        let mut conversations = self.conversations.lock();
        let conversation = conversations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Conversation not found".into()))?;
        conversation.last_message = Some(summary);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), AppError> {
        self.status_writes.lock().push((id, status));
        if let Some(user) = self.users.lock().get_mut(&id) {
            user.status = status;
        }
        Ok(())
    }
}

/// One relay instance running in-process.
pub struct TestInstance {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestInstance {
    /// Assemble an instance and start its bus subscriber.
    pub async fn start(instance_id: &str, store: Arc<MemoryStore>, bus: Arc<dyn EventBus>) -> Self {
        let state = AppState::assemble(
            test_settings(instance_id),
            store.clone(),
            store.clone(),
            store.clone(),
            bus,
        );
        state.fanout.start().await.expect("bus subscribe");
        Self { state, store }
    }

    pub fn token_for(&self, user: &User) -> String {
        JwtTokenVerifier::new(self.store.clone(), &self.state.settings.jwt)
            .issue(user.id)
            .expect("token")
    }

    /// Authenticate and open a session the way the upgrade handler does.
    pub async fn connect(&self, user: &User) -> (SessionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let token = self.token_for(user);
        let identity = self
            .state
            .gateway
            .authenticate(Some(&token))
            .await
            .expect("authenticate");
        self.state.gateway.open_session(identity)
    }

    /// Connect and join one room.
    pub async fn join(
        &self,
        user: &User,
        conversation_id: Uuid,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = self.connect(user).await;
        self.state
            .gateway
            .join_rooms(handle.id, &[conversation_id])
            .expect("join");
        (handle, rx)
    }
}

/// Next queued event, failing the test after a second.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("session queue closed")
}

/// Assert nothing arrives within a short grace period.
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected event: {:?}", event);
    }
}

/// Wait until spawned background work has had a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Router-level client for HTTP tests
pub struct TestApp {
    pub router: Router,
    pub instance: TestInstance,
}

impl TestApp {
    /// Standalone instance behind the full middleware stack
    pub async fn new() -> Self {
        let instance = TestInstance::start(
            "http-node",
            MemoryStore::new(),
            Arc::new(InMemoryEventBus::new()),
        )
        .await;
        let router = build_router(instance.state.clone());
        Self { router, instance }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated request with a JSON body
    pub async fn send_json_auth(
        &self,
        method: &str,
        uri: &str,
        body: &serde_json::Value,
        token: &str,
    ) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Read a response body as JSON
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
