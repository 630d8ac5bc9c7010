//! Tag reading ingestion
//!
//! Accepts one raw (tag, reader location, signal strength) event per
//! physical scan and fans it out: append to the date-partitioned reading
//! log, refresh the tag's last-read pointer and the reader's in-range
//! set, and attribute the reading to the tag's owner when there is one.
//!
//! The writes are deliberately NOT one transaction. Each is an
//! independent last-writer-wins operation against the shared store; a
//! crash between them leaves a recoverable intermediate state (reading
//! recorded, person location stale) that the next reading or sweep
//! corrects.

use crate::identity;
use tagsense_common::db::models::{Attribution, Reading};
use tagsense_common::{ids, time, Error, Result, Store};
use tracing::debug;

/// Normalize a human-entered reader location name to a location id
/// ("Living Room" -> "living-room")
pub fn normalize_location_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Record one tag detection reported by a fixed reader.
///
/// Readings from unknown tags are stored unattributed; that is sensor
/// data, not an error. `now` is unix seconds.
pub async fn record_reading(
    store: &Store,
    tag_id: &str,
    location_name: &str,
    rssi: i64,
    now: i64,
) -> Result<Reading> {
    let tag_id = tag_id.trim();
    if tag_id.is_empty() {
        return Err(Error::InvalidInput("tag id must be non-empty".to_string()));
    }
    let location_id = normalize_location_name(location_name);
    if location_id.is_empty() {
        return Err(Error::InvalidInput(
            "location name must be non-empty".to_string(),
        ));
    }

    let reading = Reading {
        id: ids::new_id(),
        location_id: location_id.clone(),
        date: time::date_key(now),
        tag_id: tag_id.to_string(),
        ts: now,
        rssi,
    };

    // 1. append to the per-location, per-day reading log
    sqlx::query(
        r#"
        INSERT INTO tag_readings (id, location_id, date, tag_id, ts, rssi)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reading.id)
    .bind(&reading.location_id)
    .bind(&reading.date)
    .bind(&reading.tag_id)
    .bind(reading.ts)
    .bind(reading.rssi)
    .execute(store.pool())
    .await?;

    // 2. refresh the tag's last-read pointer, creating the tag row on
    //    first observation (owner_id stays untouched)
    sqlx::query(
        r#"
        INSERT INTO tags (id, last_read_ts, last_read_location, last_read_rssi,
                          current_room, last_seen, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            last_read_ts = excluded.last_read_ts,
            last_read_location = excluded.last_read_location,
            last_read_rssi = excluded.last_read_rssi,
            current_room = excluded.current_room,
            last_seen = excluded.last_seen,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(tag_id)
    .bind(now)
    .bind(&location_id)
    .bind(rssi)
    .bind(&location_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(store.pool())
    .await?;

    // 3. refresh the reader's in-range set
    sqlx::query(
        r#"
        INSERT INTO in_range (location_id, tag_id, last_seen)
        VALUES (?, ?, ?)
        ON CONFLICT(location_id, tag_id) DO UPDATE SET last_seen = excluded.last_seen
        "#,
    )
    .bind(&location_id)
    .bind(tag_id)
    .bind(now)
    .execute(store.pool())
    .await?;

    // 4. attribute to the owner, if the tag has one
    match identity::resolve_owner(store, tag_id).await? {
        Attribution::Attributed(owner_id) => {
            attribute_to(store, &owner_id, &location_id, now).await?;
            debug!(
                "Reading {} at {} attributed to {}",
                tag_id, location_id, owner_id
            );
        }
        Attribution::Unattributed => {
            debug!("Reading {} at {} has no owner", tag_id, location_id);
        }
    }

    Ok(reading)
}

/// Move a person to `location_id`, appending to their location history
/// on a distinct consecutive change.
///
/// Repeated reads at the same location refresh presence but do not grow
/// history; re-arrival after the reaper cleared the location counts as
/// a change.
async fn attribute_to(store: &Store, person_id: &str, location_id: &str, now: i64) -> Result<()> {
    let current: Option<Option<String>> =
        sqlx::query_scalar("SELECT current_location FROM people WHERE id = ?")
            .bind(person_id)
            .fetch_optional(store.pool())
            .await?;

    let Some(current) = current else {
        // dangling owner back-reference; tolerate, the reading stays
        // recorded and unattributed
        debug!("Tag owner {} has no person record", person_id);
        return Ok(());
    };

    let changed = current.as_deref().filter(|l| !l.is_empty()) != Some(location_id);
    if changed {
        sqlx::query(
            "INSERT INTO location_history (id, person_id, location_id, ts) VALUES (?, ?, ?, ?)",
        )
        .bind(ids::new_id())
        .bind(person_id)
        .bind(location_id)
        .bind(now)
        .execute(store.pool())
        .await?;
    }

    sqlx::query(
        "UPDATE people SET current_location = ?, last_seen = ?, updated_at = ? WHERE id = ?",
    )
    .bind(location_id)
    .bind(now)
    .bind(now)
    .bind(person_id)
    .execute(store.pool())
    .await?;

    Ok(())
}
