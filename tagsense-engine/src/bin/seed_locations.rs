//! Seed the location registry with the demo floor plan.
//!
//! Idempotent: existing locations are left untouched, so this is safe
//! to run against a live store.

use anyhow::{Context, Result};
use clap::Parser;
use tagsense_common::{config, time, Store};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "seed-locations")]
#[command(about = "Seed the TagSense location registry")]
struct Args {
    /// Data folder holding the shared store
    #[arg(short, long, env = "TAGSENSE_DATA_FOLDER")]
    data_folder: Option<String>,
}

const SEED_LOCATIONS: &[(&str, &str, &str, &str)] = &[
    (
        "living-room",
        "Living Room",
        "Main living area with RFID sensor",
        "floor1",
    ),
    ("kitchen", "Kitchen", "Cooking and dining area", "floor1"),
    ("studio", "Studio", "Creative workspace", "floor2"),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let data_folder = config::resolve_data_folder(args.data_folder.as_deref(), "TAGSENSE_DATA_FOLDER")
        .context("Failed to resolve data folder")?;
    let store = Store::open(&config::db_path(&data_folder))
        .await
        .context("Failed to open store")?;

    let now = time::now_ts();
    let mut seeded = 0u32;
    for (id, name, description, floor_id) in SEED_LOCATIONS {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO locations (id, name, description, floor_id, last_update, status)
            VALUES (?, ?, ?, ?, ?, 'active')
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(floor_id)
        .bind(now)
        .execute(store.pool())
        .await?;

        if inserted.rows_affected() > 0 {
            info!("Seeded location {} ({})", id, floor_id);
            seeded += 1;
        }
    }

    info!(
        "Location registry ready ({} added, {} total seeds)",
        seeded,
        SEED_LOCATIONS.len()
    );
    Ok(())
}
