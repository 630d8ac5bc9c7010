//! Presence engine (tagsense-engine) - Main entry point
//!
//! Runs the presence maintenance daemon: the periodic staleness sweep
//! and the command expiry task, against the shared store that readers
//! and hardware agents write into.

use anyhow::{Context, Result};
use clap::Parser;
use tagsense_common::{config, Store};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tagsense-engine
#[derive(Parser, Debug)]
#[command(name = "tagsense-engine")]
#[command(about = "Presence tracking engine for TagSense")]
#[command(version)]
struct Args {
    /// Data folder holding the shared store
    #[arg(short, long, env = "TAGSENSE_DATA_FOLDER")]
    data_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagsense_engine=debug,tagsense_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let data_folder = config::resolve_data_folder(args.data_folder.as_deref(), "TAGSENSE_DATA_FOLDER")
        .context("Failed to resolve data folder")?;
    info!("Data folder: {}", data_folder.display());

    let store = Store::open(&config::db_path(&data_folder))
        .await
        .context("Failed to open store")?;
    info!("Store ready");

    tagsense_engine::tasks::start_background_tasks(store).await;

    shutdown_signal().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
