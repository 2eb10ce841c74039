//! Local SQLite store.
//!
//! Holds the same tables as the JSON exports and enforces the rules the
//! exports cannot: one report per cell per week, one parent per cell.

pub mod repository;
pub mod schema;

pub use repository::{ImportSummary, Repository};
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Open (creating if needed) the store at `db_path` and bring its schema
/// up to date.
///
/// Migrations run on a single-connection pool that is closed before the
/// working pool opens.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening store at {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::debug!("Store pool ready");

    Ok(pool)
}

/// Open the store and wrap it in a [`Repository`].
pub async fn open(db_path: &Path) -> Result<Repository> {
    Ok(Repository::new(create_pool(db_path).await?))
}
