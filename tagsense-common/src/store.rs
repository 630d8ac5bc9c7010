//! Shared store handle
//!
//! An explicitly constructed, injected handle to the shared SQLite
//! store. Components receive a `&Store`; nothing in the workspace holds
//! process-wide mutable state.

use crate::db;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

/// Handle to the shared store
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the store at `db_path`, bringing the
    /// schema, migrations and default settings up to date.
    pub async fn open(db_path: &Path) -> Result<Store> {
        let pool = db::init::init_database(db_path).await?;
        Ok(Store { pool })
    }

    /// In-memory store with the full schema and default settings.
    /// Used by tests and throwaway tooling.
    pub async fn open_in_memory() -> Result<Store> {
        let pool = SqlitePoolOptions::new()
            // a second connection would see its own empty :memory: database
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        db::init::create_schema(&pool).await?;
        db::migrations::run_migrations(&pool).await?;
        db::init::init_default_settings(&pool).await?;

        Ok(Store { pool })
    }

    /// Wrap an already initialized pool
    pub fn from_pool(pool: SqlitePool) -> Store {
        Store { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
