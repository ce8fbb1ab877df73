//! Stayra API server

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use stayra::analytics::Analytics;
use stayra::api::{create_router, AppState};
use stayra::config::AppConfig;
use stayra::storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    stayra::init_tracing(config.log.json);

    info!("Starting Stayra v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config);

    let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    store.migrate().await.context("Failed to apply migrations")?;

    let analytics = Analytics::from_config(&config.analytics)
        .context("Failed to initialise analytics client")?;
    if config.auth.jwt_secret.is_none() {
        warn!("JWT_SECRET not set, every request is anonymous");
    }

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, Arc::new(store), analytics);
    let app = create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
