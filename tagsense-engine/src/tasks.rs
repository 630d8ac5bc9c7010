//! Background tasks for the presence engine
//!
//! The staleness sweep and the command expiry each run on their own
//! timer, fully independent of any request-serving path.

use std::time::Duration;
use tagsense_common::db::settings;
use tagsense_common::{time, Store};
use tokio::time as tokio_time;
use tracing::{debug, info, warn};

use crate::{commands, reaper};

/// Start the engine's background tasks
pub async fn start_background_tasks(store: Store) {
    let sweep_period = settings::sweep_interval_secs(store.pool())
        .await
        .unwrap_or(45);
    let expiry_period = settings::command_expiry_interval_secs(store.pool())
        .await
        .unwrap_or(300);

    tokio::spawn(sweep_task(store.clone(), sweep_period));
    tokio::spawn(command_expiry_task(store, expiry_period));
}

/// Staleness sweep task - evicts presence entries past the liveness window
async fn sweep_task(store: Store, period_secs: u64) {
    let mut interval = tokio_time::interval(Duration::from_secs(period_secs.max(1)));

    info!("Staleness sweep task started ({}s interval)", period_secs);

    loop {
        interval.tick().await;

        match reaper::sweep(&store, time::now_ts()).await {
            Ok(outcome) => {
                debug!(
                    "Sweep done: {} evicted, {} in range",
                    outcome.evicted, outcome.active
                );
            }
            Err(e) => warn!("Sweep failed: {}", e),
        }
    }
}

/// Command expiry task - fails commands stuck past their age thresholds
async fn command_expiry_task(store: Store, period_secs: u64) {
    let mut interval = tokio_time::interval(Duration::from_secs(period_secs.max(1)));

    info!("Command expiry task started ({}s interval)", period_secs);

    loop {
        interval.tick().await;

        match commands::expire_stale(&store, time::now_ts()).await {
            Ok(0) => {}
            Ok(expired) => debug!("Expired {} commands", expired),
            Err(e) => warn!("Command expiry failed: {}", e),
        }
    }
}
