//! Settings access
//!
//! Read/write operational tunables from the settings table (key-value
//! store). All settings are system-wide; every service sharing the store
//! sees the same values.

use crate::Result;
use sqlx::SqlitePool;
use std::str::FromStr;

/// Get a setting parsed as T, or None when absent/NULL/unparseable
pub async fn get_setting<T: FromStr>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten().and_then(|v| v.parse::<T>().ok()))
}

/// Set a setting (insert or update)
pub async fn set_setting<T: ToString>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Maximum silence interval (seconds) before a tag's presence is stale
pub async fn liveness_window_secs(pool: &SqlitePool) -> Result<i64> {
    Ok(get_setting(pool, "liveness_window_secs")
        .await?
        .unwrap_or(300))
}

/// Staleness reaper period (seconds)
pub async fn sweep_interval_secs(pool: &SqlitePool) -> Result<u64> {
    Ok(get_setting(pool, "sweep_interval_secs").await?.unwrap_or(45))
}

/// Age (seconds) after which an unclaimed pending command expires
pub async fn command_pending_timeout_secs(pool: &SqlitePool) -> Result<i64> {
    Ok(get_setting(pool, "command_pending_timeout_secs")
        .await?
        .unwrap_or(86_400))
}

/// Silence (seconds) after which a claimed command expires
pub async fn command_in_progress_timeout_secs(pool: &SqlitePool) -> Result<i64> {
    Ok(get_setting(pool, "command_in_progress_timeout_secs")
        .await?
        .unwrap_or(3_600))
}

/// Command expiry task period (seconds)
pub async fn command_expiry_interval_secs(pool: &SqlitePool) -> Result<u64> {
    Ok(get_setting(pool, "command_expiry_interval_secs")
        .await?
        .unwrap_or(300))
}

/// Hardware agent poll period (seconds)
pub async fn agent_poll_interval_secs(pool: &SqlitePool) -> Result<u64> {
    Ok(get_setting(pool, "agent_poll_interval_secs")
        .await?
        .unwrap_or(5))
}

/// Visitor count recorded by the last sweep (trend baseline)
pub async fn visitor_count_snapshot(pool: &SqlitePool) -> Result<i64> {
    Ok(get_setting(pool, "visitor_count_snapshot")
        .await?
        .unwrap_or(0))
}

/// Record the visitor count observed by a sweep
pub async fn set_visitor_count_snapshot(pool: &SqlitePool, count: i64) -> Result<()> {
    set_setting(pool, "visitor_count_snapshot", count).await
}
