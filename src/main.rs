//! customformsd - forms and survey builder backend.
//!
//! Serves a JSON API over templates, questions, responses, comments and
//! likes, backed by SQLite.

mod config;
mod db;
mod error;
mod http;
mod metrics;
mod services;
mod telemetry;

use crate::config::Config;
use crate::db::Database;
use crate::services::Services;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), see log above",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        "Starting customformsd"
    );

    // Initialize database
    let db =
        Database::with_pool_size(&config.database.path, config.database.max_connections)
            .await?;

    let services = Services::new(db, &config);
    services.topics.seed_defaults(&config.topics.defaults).await?;

    if config.server.metrics {
        metrics::init();
        info!("Metrics initialized");
    } else {
        info!("Metrics disabled");
    }

    let state = http::AppState::new(services, &config)?;
    let app = http::router(state, config.server.metrics);

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .map_err(|e| {
            error!(addr = %config.server.listen, error = %e, "Failed to bind listener");
            e
        })?;
    info!(addr = %config.server.listen, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
