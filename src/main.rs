mod config;
mod db;
mod game;
mod models;
mod routes;
mod websocket;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use axum::{routing::get, Router};
use config::Config;
use dashmap::DashMap;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// How often the cleanup task sweeps the session registry.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One live game session: the driver task that owns its engine and timers.
pub struct SessionEntry {
    pub started_at: Instant,
    pub driver: JoinHandle<()>,
}

impl SessionEntry {
    /// True once the session has outlived the configured maximum age.
    pub fn is_expired(&self, max_age: Duration, now: Instant) -> bool {
        now.duration_since(self.started_at) > max_age
    }
}

/// Application state shared across all handlers
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    /// Live sessions keyed by session id; one per WebSocket connection.
    pub sessions: DashMap<Uuid, SessionEntry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crane_catcher_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Crane Catcher backend server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = db::create_pool(config.database_url(), config.database.max_connections).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    // Create application state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        sessions: DashMap::new(),
    });

    // Spawn background task to evict sessions past their maximum age
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        session_cleanup_task(cleanup_state).await;
    });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Serve frontend static files
    let frontend_service = ServeDir::new(&config.server.frontend_dir);

    // Build router
    let app = Router::new()
        // WebSocket endpoint
        .route("/ws", get(websocket::handle_websocket))
        // API routes
        .merge(routes::create_routes())
        .fallback_service(frontend_service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket endpoint: ws://{}/ws", addr);
    tracing::info!("Leaderboard API: http://{}/api/scores", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task that evicts sessions older than the configured maximum
/// age. Aborting the driver cancels every timer the session owns; the
/// WebSocket handler then notices the closed channel and cleans up.
async fn session_cleanup_task(state: Arc<AppState>) {
    let max_age = state.config.game.session_max_age();
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let now = Instant::now();
        let expired: Vec<Uuid> = state
            .sessions
            .iter()
            .filter(|entry| entry.is_expired(max_age, now))
            .map(|entry| *entry.key())
            .collect();

        for session_id in expired {
            if let Some((_, entry)) = state.sessions.remove(&session_id) {
                entry.driver.abort();
                tracing::info!("Evicted session {} (max age exceeded)", session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_started_at(started_at: Instant) -> SessionEntry {
        SessionEntry {
            started_at,
            driver: tokio::spawn(async {}),
        }
    }

    #[tokio::test]
    async fn fresh_session_is_not_expired() {
        let entry = entry_started_at(Instant::now());
        assert!(!entry.is_expired(Duration::from_secs(900), Instant::now()));
    }

    #[tokio::test]
    async fn old_session_is_expired() {
        let now = Instant::now();
        let entry = entry_started_at(now);
        let later = now + Duration::from_secs(901);
        assert!(entry.is_expired(Duration::from_secs(900), later));
    }

    #[tokio::test]
    async fn session_at_exact_max_age_is_kept() {
        let now = Instant::now();
        let entry = entry_started_at(now);
        let later = now + Duration::from_secs(900);
        assert!(!entry.is_expired(Duration::from_secs(900), later));
    }
}
