//! Store initialization
//!
//! Creates the SQLite store on first run and brings existing stores up
//! to date. Schema creation is idempotent and safe to run concurrently
//! from multiple services sharing the same database file.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the shared store and bring its schema and
/// default settings up to date.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new store: {}", db_path.display());
    } else {
        info!("Opened existing store: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer; readers, the engine
    // and hardware agents all share this file.
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    // Writers back off instead of failing fast on lock contention
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_people_table(pool).await?;
    create_person_tags_table(pool).await?;
    create_tags_table(pool).await?;
    create_tag_readings_table(pool).await?;
    create_location_history_table(pool).await?;
    create_locations_table(pool).await?;
    create_in_range_table(pool).await?;
    create_commands_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores operational tunables as key-value pairs, shared by every
/// service against the same store.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the people table (`people/{id}`)
pub async fn create_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS people (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('resident', 'visitor')),
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            dob TEXT,
            user_id TEXT,
            current_location TEXT,
            last_seen INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (length(first_name) > 0),
            CHECK (length(last_name) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_kind ON people(kind)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_people_current_location ON people(current_location)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the person_tags table (a person's assigned tag set)
async fn create_person_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person_tags (
            person_id TEXT NOT NULL REFERENCES people(id),
            tag_id TEXT NOT NULL,
            assigned_at INTEGER NOT NULL,
            PRIMARY KEY (person_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_person_tags_tag ON person_tags(tag_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the tags table (`tags/{id}`, keyed by physical EPC)
pub async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            last_read_ts INTEGER,
            last_read_location TEXT,
            last_read_rssi INTEGER,
            current_room TEXT,
            last_seen INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (length(id) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_owner ON tags(owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the tag_readings table
/// (`tag_readings/{location_id}/{date}/{reading_id}`)
///
/// Append-only; the core never mutates or deletes rows here. The
/// (location_id, date) pair keeps partitions bounded for retention
/// tooling, which is an external concern.
pub async fn create_tag_readings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag_readings (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            date TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            ts INTEGER NOT NULL,
            rssi INTEGER NOT NULL DEFAULT 0,
            CHECK (length(location_id) > 0),
            CHECK (length(tag_id) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tag_readings_partition ON tag_readings(location_id, date)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tag_readings_tag ON tag_readings(tag_id, ts)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the location_history table (a person's movement log)
async fn create_location_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS location_history (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL,
            location_id TEXT NOT NULL,
            ts INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_location_history_person ON location_history(person_id, ts)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the locations table (`locations/{id}`)
pub async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            floor_id TEXT NOT NULL DEFAULT 'floor1',
            occupants TEXT NOT NULL DEFAULT '[]',
            last_update INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_locations_floor ON locations(floor_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the in_range table (per-reader presence cache)
///
/// One row per (reader location, tag) currently considered in range.
/// Refreshed by the ingestor, pruned by the staleness reaper. Derived
/// state; losing it only delays eviction by one liveness window.
pub async fn create_in_range_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS in_range (
            location_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            last_seen INTEGER NOT NULL,
            PRIMARY KEY (location_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_in_range_last_seen ON in_range(last_seen)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the commands table (`commands/{kind}/{id}`)
pub async fn create_commands_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commands (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            target_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
            params TEXT NOT NULL DEFAULT '{}',
            error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (length(kind) > 0),
            CHECK (length(target_id) > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_commands_kind_status ON commands(kind, status, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all operational tunables exist with default values; NULL
/// values are reset to defaults.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Presence liveness
    ensure_setting(pool, "liveness_window_secs", "300").await?;
    ensure_setting(pool, "sweep_interval_secs", "45").await?;

    // Command queue expiry
    ensure_setting(pool, "command_pending_timeout_secs", "86400").await?; // 24 hours
    ensure_setting(pool, "command_in_progress_timeout_secs", "3600").await?; // 1 hour
    ensure_setting(pool, "command_expiry_interval_secs", "300").await?;

    // Hardware agent polling
    ensure_setting(pool, "agent_poll_interval_secs", "5").await?;

    // Visitor trend baseline, rewritten by every sweep
    ensure_setting(pool, "visitor_count_snapshot", "0").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // Multiple services may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!(
            "Initialized setting '{}' with default value: {}",
            key, default_value
        );
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        tracing::warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
