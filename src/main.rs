use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use zenn_clone::app::{self, AppState};
use zenn_clone::auth::{self as auth_provider, AuthProvider, LocalAuthProvider};
use zenn_clone::config;
use zenn_clone::database::DatabaseManager;

const DEFAULT_LOG_FILTER: &str = "zenn_clone=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting Zenn Clone API in {:?} mode", config.environment);
    if zenn_clone::is_development!() {
        tracing::warn!("Development mode: CORS accepts any origin");
    }

    let store = DatabaseManager::open(&config.storage)
        .await
        .context("failed to open data store")?;
    let auth = Arc::new(LocalAuthProvider::new(store.clone(), &config.security).context("failed to set up auth provider")?);

    let shutdown = CancellationToken::new();
    if config.security.enable_audit_logging {
        auth_provider::spawn_audit_log(auth.subscribe(), shutdown.clone());
    }

    let state = AppState::new(Arc::new(config.clone()), store, auth, shutdown.clone());
    let app = app::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Zenn Clone API listening on http://{}", listener.local_addr()?);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown requested, draining connections");
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
