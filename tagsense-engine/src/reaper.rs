//! Staleness reaper
//!
//! Per (reader, tag) pair the state machine is:
//! present -> (no refresh within the liveness window) -> absent.
//! A sweep partitions every reader's in-range set by last refresh,
//! evicts the inactive entries and clears the derived presence pointers
//! they backed. Sweeping never touches the reading log; only live
//! in-range pointers are removed.
//!
//! Sweeps are idempotent: a second sweep with no intervening readings
//! changes nothing. They run from an explicit periodic task (see
//! `tasks`), never inline in read paths.

use crate::presence;
use tagsense_common::db::settings;
use tagsense_common::{Result, Store};
use tracing::{debug, info};

/// What one sweep did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// In-range entries evicted as stale
    pub evicted: usize,
    /// In-range entries still live after the sweep
    pub active: usize,
}

/// Evict every in-range entry not refreshed within the liveness window.
///
/// For each evicted entry the owning person's `current_location` is
/// cleared and the tag's own presence pointer is cleared - in both cases
/// only while the pointer still names the evicting reader, so a person
/// or tag that already moved on is left alone. `now` is unix seconds.
pub async fn sweep(store: &Store, now: i64) -> Result<SweepOutcome> {
    let window = settings::liveness_window_secs(store.pool()).await?;
    let cutoff = now - window;

    let stale: Vec<(String, String)> =
        sqlx::query_as("SELECT location_id, tag_id FROM in_range WHERE last_seen <= ?")
            .bind(cutoff)
            .fetch_all(store.pool())
            .await?;

    for (location_id, tag_id) in &stale {
        sqlx::query("DELETE FROM in_range WHERE location_id = ? AND tag_id = ?")
            .bind(location_id)
            .bind(tag_id)
            .execute(store.pool())
            .await?;

        let owner: Option<Option<String>> =
            sqlx::query_scalar("SELECT owner_id FROM tags WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(store.pool())
                .await?;

        if let Some(owner_id) = owner.flatten().filter(|o| !o.is_empty()) {
            sqlx::query(
                r#"
                UPDATE people SET current_location = NULL, last_seen = ?, updated_at = ?
                WHERE id = ? AND current_location = ?
                "#,
            )
            .bind(now)
            .bind(now)
            .bind(&owner_id)
            .bind(location_id)
            .execute(store.pool())
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE tags SET current_room = NULL, last_seen = ?, updated_at = ?
            WHERE id = ? AND current_room = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(tag_id)
        .bind(location_id)
        .execute(store.pool())
        .await?;

        debug!("Evicted tag {} from {}", tag_id, location_id);
    }

    // Presence with no in-range entry left to evict it (tag reassigned
    // mid-visit, legacy data) still ages out by the person's own last
    // refresh.
    sqlx::query(
        r#"
        UPDATE people SET current_location = NULL, last_seen = ?, updated_at = ?
        WHERE current_location IS NOT NULL AND current_location != ''
          AND (last_seen IS NULL OR last_seen <= ?)
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(cutoff)
    .execute(store.pool())
    .await?;

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM in_range WHERE last_seen > ?")
        .bind(cutoff)
        .fetch_one(store.pool())
        .await?;

    presence::refresh_location_occupants(store, now).await?;
    record_visitor_snapshot(store).await?;

    let outcome = SweepOutcome {
        evicted: stale.len(),
        active: active as usize,
    };
    if outcome.evicted > 0 {
        info!(
            "Sweep evicted {} stale entries ({} still in range)",
            outcome.evicted, outcome.active
        );
    } else {
        debug!("Sweep found nothing stale ({} in range)", outcome.active);
    }

    Ok(outcome)
}

/// Record the live visitor count as the trend baseline for
/// `presence::visitor_summary`. Written only on change so an idle sweep
/// stays a pure no-op.
async fn record_visitor_snapshot(store: &Store) -> Result<()> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM people
        WHERE kind = 'visitor' AND current_location IS NOT NULL AND current_location != ''
        "#,
    )
    .fetch_one(store.pool())
    .await?;

    if settings::visitor_count_snapshot(store.pool()).await? != count {
        settings::set_visitor_count_snapshot(store.pool(), count).await?;
    }

    Ok(())
}
