//! Hardware agent simulator (tagsense-agent) - Main entry point
//!
//! Stands in for the embedded RFID writer during development. Honors
//! the command queue contract: poll own command kind, claim pending
//! commands, encode the tag, report completion (which records the tag
//! assignment). When this process is not running, commands simply stay
//! pending - the engine's expiry task eventually fails them.

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::time::Duration;
use tagsense_common::db::models::{Command, WRITE_RFID};
use tagsense_common::db::settings;
use tagsense_common::{config, time, Store};
use tagsense_engine::commands;
use tokio::signal;
use tokio::time as tokio_time;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tagsense-agent
#[derive(Parser, Debug)]
#[command(name = "tagsense-agent")]
#[command(about = "RFID hardware agent simulator for TagSense")]
#[command(version)]
struct Args {
    /// Data folder holding the shared store
    #[arg(short, long, env = "TAGSENSE_DATA_FOLDER")]
    data_folder: Option<String>,

    /// Poll period in seconds (defaults to the store setting)
    #[arg(short, long)]
    poll_interval: Option<u64>,

    /// Simulated encode duration in milliseconds
    #[arg(long, default_value = "250")]
    encode_millis: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagsense_agent=debug,tagsense_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let data_folder = config::resolve_data_folder(args.data_folder.as_deref(), "TAGSENSE_DATA_FOLDER")
        .context("Failed to resolve data folder")?;
    let store = Store::open(&config::db_path(&data_folder))
        .await
        .context("Failed to open store")?;

    let period = match args.poll_interval {
        Some(period) => period,
        None => settings::agent_poll_interval_secs(store.pool()).await?,
    };
    let mut interval = tokio_time::interval(Duration::from_secs(period.max(1)));

    info!(
        "Agent polling {} commands every {}s",
        WRITE_RFID, period
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = poll_once(&store, args.encode_millis).await {
                    warn!("Poll failed: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Agent shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Claim and execute at most one command
async fn poll_once(store: &Store, encode_millis: u64) -> tagsense_common::Result<()> {
    let Some(command) = commands::claim_next(store, WRITE_RFID, time::now_ts()).await? else {
        return Ok(());
    };

    info!(
        "Claimed command {} (target {})",
        command.id, command.target_id
    );

    // stand-in for the actual tag encode cycle
    tokio_time::sleep(Duration::from_millis(encode_millis)).await;

    let epc = epc_for(&command);
    commands::complete_write_rfid(store, &command.id, &epc, time::now_ts()).await?;
    info!("Encoded tag {} for command {}", epc, command.id);

    Ok(())
}

/// EPC written to the tag: derived from the registration user id when
/// present, random otherwise. 24 hex characters (96-bit EPC).
fn epc_for(command: &Command) -> String {
    let seed: String = command
        .params
        .get("user_id")
        .map(|s| {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_uppercase()
        })
        .unwrap_or_default();

    if seed.is_empty() {
        let mut rng = rand::thread_rng();
        format!("{:012X}{:012X}", rng.gen::<u64>() & 0xFFFF_FFFF_FFFF, rng.gen::<u64>() & 0xFFFF_FFFF_FFFF)
    } else {
        let hex: String = seed.bytes().map(|b| format!("{b:02X}")).collect();
        format!("{hex:0<24}")[..24].to_string()
    }
}

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
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
