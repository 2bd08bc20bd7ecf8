use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/ttsdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &ttsdb_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),
    #[error("concurrent append detected for product {product_id}")]
    WriteConflict { product_id: String },
    #[error("record not found")]
    NotFound,
    #[error("ingestion run {id} is not in expected status '{expected_status}'")]
    InvalidIngestionRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// `true` when the error means the database cannot be reached at all,
    /// as opposed to a failure scoped to one record.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            DbError::StoreUnavailable(_) => true,
            DbError::Sqlx(e) => is_connection_error(e),
            _ => false,
        }
    }
}

/// Transport-level failures that mean no statement can reach the database.
pub(crate) fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
    )
}

/// Connect to a Postgres pool using explicit URL and config, then ping it so an
/// unreachable store is reported up front.
///
/// # Errors
///
/// Returns [`DbError::StoreUnavailable`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
        .map_err(DbError::StoreUnavailable)?;

    health_check(&pool).await?;
    Ok(pool)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    // The _sqlx_migrations table may not exist yet on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and map any failure to [`DbError::StoreUnavailable`].
///
/// # Errors
///
/// Returns [`DbError::StoreUnavailable`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await.map_err(DbError::StoreUnavailable)
}

pub mod history;
pub mod ingestion_runs;
pub mod memory;
pub mod pg_store;
pub mod recorder;
pub mod snapshots;
pub mod stock_events;
pub mod stock_history;
pub mod store;

pub use history::{update_stock_history, HistoryBatchReport, ProductFailure};
pub use ingestion_runs::{
    complete_ingestion_run, create_ingestion_run, fail_ingestion_run, get_ingestion_run,
    list_ingestion_run_collections, list_ingestion_runs, start_ingestion_run,
    upsert_ingestion_run_collection, IngestionRunCollectionRow, IngestionRunRow,
};
pub use memory::InMemoryStore;
pub use pg_store::PgStore;
pub use recorder::record_snapshot;
pub use snapshots::insert_snapshot_rows;
pub use stock_events::{list_recent_stock_events, list_stock_events, StockChangeEventRow};
pub use stock_history::{apply_stock_snapshot, get_stock_history};
pub use store::{SnapshotInsertReport, SnapshotStore, StockHistoryRecord, StockStore, StockUpdate};
