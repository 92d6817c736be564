//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use crate::config::Settings;
use crate::infrastructure::cache::{self, LocalPresenceStore, PresenceStore, RedisPresenceStore};
use crate::infrastructure::database;
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Hub;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// `None` when Redis is disabled in configuration
    pub redis: Option<ConnectionManager>,
    pub presence: Arc<dyn PresenceStore>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub hub: Arc<Hub>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// State backed by in-process presence, for single-instance setups.
    pub fn local(db: PgPool, settings: Settings) -> Self {
        Self {
            db,
            redis: None,
            presence: Arc::new(LocalPresenceStore::new()),
            snowflake: Arc::new(SnowflakeGenerator::new(settings.snowflake.machine_id as u64, 0)),
            hub: Arc::new(Hub::new(settings.hub.heartbeat_interval_ms)),
            settings: Arc::new(settings),
        }
    }
}

/// Full router with tracing, CORS and compression layers applied.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(logging::create_trace_layer())
            .layer(cors)
            .layer(CompressionLayer::new()),
    )
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        let mut state = AppState::local(db, settings.clone());

        if settings.redis.enabled {
            let redis = cache::create_redis_client(&settings.redis).await?;
            state.presence = Arc::new(RedisPresenceStore::new(
                redis.clone(),
                settings.redis.presence_ttl_secs,
            ));
            state.redis = Some(redis);
        } else {
            tracing::warn!("Redis disabled, presence is tracked in-process only");
        }

        let router = build_router(state);

        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "Listening");

        Ok(Self { listener, router })
    }

    /// Run the server until Ctrl+C
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
