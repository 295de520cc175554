//! # Stockline API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Console ───► HTTP (8080) ───► Router ───► stockline-db ───► SQLite     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stockline_api::config::ApiConfig;
use stockline_api::{build_router, AppState};
use stockline_db::Database;

const DEFAULT_LOG_FILTER: &str = "info,stockline=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting Stockline API server...");

    let config = ApiConfig::load()?;
    let db_config = config.db_config()?;
    info!(
        bind_address = %config.bind_address,
        database = %db_config.database_path.display(),
        partial_delivery = ?config.policy.partial_delivery,
        negative_count = ?config.policy.negative_count,
        "Configuration loaded"
    );

    let db = Database::new(db_config).await?;
    let state = AppState::new(db.clone());
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
