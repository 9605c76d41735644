//! pmide-store - Local data service for the PM IDE
//!
//! Owns the SQLite database and relays chat to the sidecar. Binds to
//! localhost only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pmide_common::config::{resolve_root_folder, PmIdeConfig, RootFolderInitializer, ROOT_ENV_VAR};
use pmide_common::events::EventBus;
use pmide_store::db::init_database;
use pmide_store::secrets::SecretBox;
use pmide_store::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for pmide-store
#[derive(Parser, Debug)]
#[command(name = "pmide-store")]
#[command(about = "Local data service for the PM IDE")]
#[command(version)]
struct Args {
    /// Folder holding pmide.db and the secret key
    #[arg(short, long, env = ROOT_ENV_VAR)]
    root_folder: Option<PathBuf>,

    /// Explicit config.toml
    #[arg(short, long, env = "PMIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config.toml)
    #[arg(short, long, env = "PMIDE_STORE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting PM IDE store (pmide-store) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = PmIdeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_ENV_VAR, &config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path, &config.store).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let secrets = SecretBox::load_or_create(&initializer.secret_path())
        .context("Failed to load secret key")?;

    let state = AppState::new(pool, EventBus::default(), secrets);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.store.port);
    let addr = format!("{}:{}", config.store.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("pmide-store listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
