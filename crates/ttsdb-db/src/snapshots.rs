//! Database operations for `stock_snapshots`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ttsdb_core::SnapshotRow;

use crate::store::SnapshotInsertReport;
use crate::{is_connection_error, DbError};

/// Bulk-inserts snapshot rows, skipping the ones the database rejects.
///
/// The fast path is one `UNNEST` statement with `ON CONFLICT DO NOTHING`, so
/// rows whose `(recorded_at, product_id, size)` key already exists are
/// skipped. If that statement fails for any reason other than a lost
/// connection, the rows are retried one at a time and each rejected row is
/// logged and counted as skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] only when the database cannot be reached.
pub async fn insert_snapshot_rows(
    pool: &PgPool,
    rows: &[SnapshotRow],
) -> Result<SnapshotInsertReport, DbError> {
    if rows.is_empty() {
        return Ok(SnapshotInsertReport::default());
    }

    match insert_batch(pool, rows).await {
        Ok(inserted) => Ok(report(rows.len(), inserted)),
        Err(e) if is_connection_error(&e) => Err(e.into()),
        Err(e) => {
            tracing::warn!(
                rows = rows.len(),
                error = %e,
                "bulk snapshot insert rejected; retrying row by row"
            );
            insert_each(pool, rows).await
        }
    }
}

async fn insert_batch(pool: &PgPool, rows: &[SnapshotRow]) -> Result<u64, sqlx::Error> {
    let recorded_at: Vec<DateTime<Utc>> = rows.iter().map(|r| r.recorded_at).collect();
    let product_ids: Vec<&str> = rows.iter().map(|r| r.product_id.as_str()).collect();
    let sizes: Vec<&str> = rows.iter().map(|r| r.size.as_str()).collect();
    let quantities: Vec<i32> = rows.iter().map(|r| r.quantity).collect();

    let result = sqlx::query(
        "INSERT INTO stock_snapshots (recorded_at, product_id, size, quantity) \
         SELECT * FROM UNNEST($1::timestamptz[], $2::text[], $3::text[], $4::int4[]) \
         ON CONFLICT (recorded_at, product_id, size) DO NOTHING",
    )
    .bind(&recorded_at)
    .bind(&product_ids)
    .bind(&sizes)
    .bind(&quantities)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_each(pool: &PgPool, rows: &[SnapshotRow]) -> Result<SnapshotInsertReport, DbError> {
    let mut inserted: u64 = 0;

    for row in rows {
        let result = sqlx::query(
            "INSERT INTO stock_snapshots (recorded_at, product_id, size, quantity) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (recorded_at, product_id, size) DO NOTHING",
        )
        .bind(row.recorded_at)
        .bind(&row.product_id)
        .bind(&row.size)
        .bind(row.quantity)
        .execute(pool)
        .await;

        match result {
            Ok(done) => inserted += done.rows_affected(),
            Err(e) if is_connection_error(&e) => return Err(e.into()),
            Err(e) => tracing::warn!(
                product_id = %row.product_id,
                size = %row.size.escape_debug(),
                error = %e,
                "snapshot row rejected"
            ),
        }
    }

    Ok(report(rows.len(), inserted))
}

fn report(total: usize, inserted: u64) -> SnapshotInsertReport {
    let total = u64::try_from(total).unwrap_or(u64::MAX);
    SnapshotInsertReport {
        inserted,
        skipped: total.saturating_sub(inserted),
    }
}

/// Counts snapshot rows captured for a product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_snapshot_rows(pool: &PgPool, product_id: &str) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM stock_snapshots WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
