//! pmide-sidecar - LLM proxy for the PM IDE
//!
//! Stateless: API keys arrive with each request and nothing is persisted.
//! Binds to localhost only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pmide_common::config::PmIdeConfig;
use pmide_sidecar::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for pmide-sidecar
#[derive(Parser, Debug)]
#[command(name = "pmide-sidecar")]
#[command(about = "LLM proxy for the PM IDE")]
#[command(version)]
struct Args {
    /// Explicit config.toml
    #[arg(short, long, env = "PMIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config.toml)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory of framework definition files (overrides config.toml)
    #[arg(long, env = "PMIDE_FRAMEWORKS_DIR")]
    frameworks_dir: Option<PathBuf>,
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
        "Starting PM IDE sidecar (pmide-sidecar) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let mut config = PmIdeConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .sidecar;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.frameworks_dir {
        config.frameworks_dir = Some(dir);
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config).context("Failed to build HTTP client")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("pmide-sidecar listening on http://{}", addr);
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
