//! Database operations for `ingestion_runs` and `ingestion_run_collections`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub products_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `ingestion_run_collections` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunCollectionRow {
    pub id: i64,
    pub run_id: i64,
    pub collection: String,
    pub status: String,
    pub products_fetched: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ingestion_runs operations
// ---------------------------------------------------------------------------

/// Creates a new ingestion run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingestion_run(
    pool: &PgPool,
    trigger_source: &str,
) -> Result<IngestionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, IngestionRunRow>(
        "INSERT INTO ingestion_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING id, public_id, trigger_source, status, \
                   started_at, completed_at, products_processed, error_message, created_at",
    )
    .bind(public_id)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestionRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_ingestion_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestionRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` with the number of products it processed.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestionRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingestion_run(
    pool: &PgPool,
    id: i64,
    products_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'succeeded', completed_at = NOW(), products_processed = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(products_processed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` and records why.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestionRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingestion_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_ingestion_run(pool: &PgPool, id: i64) -> Result<IngestionRunRow, DbError> {
    sqlx::query_as::<_, IngestionRunRow>(
        "SELECT id, public_id, trigger_source, status, \
                started_at, completed_at, products_processed, error_message, created_at \
         FROM ingestion_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<IngestionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionRunRow>(
        "SELECT id, public_id, trigger_source, status, \
                started_at, completed_at, products_processed, error_message, created_at \
         FROM ingestion_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// ingestion_run_collections operations
// ---------------------------------------------------------------------------

/// Records the outcome of one collection within a run.
///
/// Conflicts on `(run_id, collection)` overwrite the previous outcome.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_ingestion_run_collection(
    pool: &PgPool,
    run_id: i64,
    collection: &str,
    status: &str,
    products_fetched: Option<i32>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO ingestion_run_collections \
             (run_id, collection, status, products_fetched, error_message) \
         VALUES ($1, $2, $3, COALESCE($4, 0), $5) \
         ON CONFLICT (run_id, collection) DO UPDATE SET \
             status           = EXCLUDED.status, \
             products_fetched = EXCLUDED.products_fetched, \
             error_message    = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(collection)
    .bind(status)
    .bind(products_fetched)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_run_collections(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<IngestionRunCollectionRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionRunCollectionRow>(
        "SELECT id, run_id, collection, status, products_fetched, error_message, created_at \
         FROM ingestion_run_collections \
         WHERE run_id = $1 \
         ORDER BY collection",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
