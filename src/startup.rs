//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::application::services::{
    JwtTokenVerifier, MessageDistributor, MessageService, MessageServiceImpl, PresenceService,
    PresenceServiceImpl, TokenVerifier,
};
use crate::config::{BusKind, Settings};
use crate::domain::{ConversationRepository, MessageRepository, UserRepository};
use crate::infrastructure::bus::{EventBus, InMemoryEventBus, RedisEventBus};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    PgConversationRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::cors;
use crate::presentation::websocket::{FanoutEngine, Gateway};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Absent when the stores are not PostgreSQL-backed
    pub db: Option<PgPool>,
    pub gateway: Arc<Gateway>,
    pub fanout: Arc<FanoutEngine>,
    pub message_service: Arc<dyn MessageService>,
    pub presence_service: Arc<dyn PresenceService>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the services of one instance over the given stores and bus.
    /// The bus subscriber is not started; call `FanoutEngine::start`.
    pub fn assemble<M, C, U>(
        settings: Settings,
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        user_repo: Arc<U>,
        bus: Arc<dyn EventBus>,
    ) -> Self
    where
        M: MessageRepository + 'static,
        C: ConversationRepository + 'static,
        U: UserRepository + 'static,
    {
        let verifier: Arc<dyn TokenVerifier> =
            Arc::new(JwtTokenVerifier::new(user_repo.clone(), &settings.jwt));
        let presence_service: Arc<dyn PresenceService> = Arc::new(PresenceServiceImpl::new(
            message_repo.clone(),
            user_repo.clone(),
        ));

        let gateway = Arc::new(Gateway::new(verifier.clone(), presence_service.clone()));
        let fanout = Arc::new(FanoutEngine::new(
            settings.instance.id.clone(),
            settings.bus.channel.clone(),
            gateway.clone(),
            bus,
            settings.bus.dedup_window,
        ));

        let distributor: Arc<dyn MessageDistributor> = fanout.clone();
        let message_service: Arc<dyn MessageService> = Arc::new(MessageServiceImpl::new(
            message_repo,
            conversation_repo,
            user_repo,
            distributor,
        ));

        Self {
            db: None,
            gateway,
            fanout,
            message_service,
            presence_service,
            verifier,
            settings: Arc::new(settings),
        }
    }
}

/// Build the router with the HTTP middleware stack
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    bus: Arc<dyn EventBus>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database connection pool created");

        let bus: Arc<dyn EventBus> = match settings.bus.kind {
            BusKind::Redis => Arc::new(
                RedisEventBus::connect(
                    &settings.redis,
                    Duration::from_millis(settings.bus.reconnect_delay_ms),
                )
                .await?,
            ),
            BusKind::Memory => {
                tracing::warn!("In-process bus selected; messages stay on this instance");
                Arc::new(InMemoryEventBus::new())
            }
        };

        let mut state = AppState::assemble(
            settings.clone(),
            Arc::new(PgMessageRepository::new(db.clone())),
            Arc::new(PgConversationRepository::new(db.clone())),
            Arc::new(PgUserRepository::new(db.clone())),
            bus.clone(),
        );
        state.db = Some(db);

        state.fanout.start().await?;
        tracing::info!(
            instance_id = %settings.instance.id,
            channel = %settings.bus.channel,
            "Bus subscriber started"
        );

        let router = build_router(state);

        // Bind to address
        let addr: SocketAddr = settings.server_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            bus,
        })
    }

    /// Run the server until a shutdown signal, then close the bus
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.bus.close().await;
        tracing::info!("Bus closed");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
