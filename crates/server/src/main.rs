use std::path::PathBuf;

use anyhow::{Context, Error as AnyhowError};
use clap::Parser;
use config::{AppConfig, ConfigError, sqlite_url};
use db::{DBService, DbErr};
use server::{AppState, http};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Error)]
pub enum TodoServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Todo list web service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// SQLite database file; overrides DATABASE_URL and TODO_DATABASE.
    #[arg(long)]
    database: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Enable POST /api/_reset for end-to-end test runs.
    #[arg(long)]
    test_reset: bool,
}

impl Cli {
    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(path) = self.database {
            config.database_url = sqlite_url(&path);
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.test_reset |= self.test_reset;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), TodoServerError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},db={level},config={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = cli.apply(AppConfig::from_env()?);
    if config.test_reset {
        tracing::warn!("Test reset endpoint enabled at POST /api/_reset");
    }

    let db = DBService::new(&config.database_url, config.test_reset).await?;
    let app_router = http::router(AppState::new(db)?);

    let listener = bind(&config.bind_address()).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Server running on http://{local_addr}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, TodoServerError> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    Ok(listener)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
