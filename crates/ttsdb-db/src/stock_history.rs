//! Database operations for `stock_histories`, `stock_history_entries`, and the
//! change events written alongside each appended entry.

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use ttsdb_core::{plan_stock_update, SizeMap, SizeStock, StockEntry};

use crate::store::{StockHistoryRecord, StockUpdate};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `stock_history_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockHistoryEntryRow {
    pub id: i64,
    pub history_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub sizes: Json<SizeMap>,
}

impl From<StockHistoryEntryRow> for StockEntry {
    fn from(row: StockHistoryEntryRow) -> Self {
        Self {
            recorded_at: row.recorded_at,
            sizes: row.sizes.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Applies one observation to a product's history inside a single transaction.
///
/// The history row is created with `ON CONFLICT DO NOTHING RETURNING id`; when
/// it already exists it is locked with `SELECT ... FOR UPDATE`. Either way the
/// row lock is held until commit, so concurrent callers for the same product
/// serialize on it and the last entry they read is the one they compare
/// against.
///
/// # Errors
///
/// Returns [`DbError::WriteConflict`] if an entry with the same `recorded_at`
/// already exists for the product, or [`DbError::Sqlx`] on any other failure.
/// Nothing is written when an error is returned.
pub async fn apply_stock_snapshot(
    pool: &PgPool,
    product_id: &str,
    sizes: &[SizeStock],
    recorded_at: DateTime<Utc>,
) -> Result<StockUpdate, DbError> {
    let mut tx = pool.begin().await?;

    let (history_id, created) = lock_or_create_history(&mut tx, product_id).await?;

    let last: Option<Json<SizeMap>> = sqlx::query_scalar::<_, Json<SizeMap>>(
        "SELECT sizes \
         FROM stock_history_entries \
         WHERE history_id = $1 \
         ORDER BY recorded_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(history_id)
    .fetch_optional(&mut *tx)
    .await?;

    let plan = plan_stock_update(last.as_ref().map(|j| &j.0), sizes);

    if plan.appends_entry() {
        let current: SizeMap = sizes.iter().map(|s| (s.size.clone(), s.quantity)).collect();

        sqlx::query(
            "INSERT INTO stock_history_entries (history_id, recorded_at, sizes) \
             VALUES ($1, $2, $3)",
        )
        .bind(history_id)
        .bind(recorded_at)
        .bind(Json(&current))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_append_error(e, product_id))?;

        let changes = plan.changes();
        let event_sizes: Vec<&str> = changes.iter().map(|c| c.size.as_str()).collect();
        let old_stocks: Vec<i32> = changes.iter().map(|c| c.old_stock).collect();
        let new_stocks: Vec<i32> = changes.iter().map(|c| c.new_stock).collect();

        sqlx::query(
            "INSERT INTO stock_change_events \
                 (recorded_at, product_id, size, old_stock, new_stock) \
             SELECT $1, $2, e.size, e.old_stock, e.new_stock \
             FROM UNNEST($3::text[], $4::int4[], $5::int4[]) \
                  AS e(size, old_stock, new_stock)",
        )
        .bind(recorded_at)
        .bind(product_id)
        .bind(&event_sizes)
        .bind(&old_stocks)
        .bind(&new_stocks)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(StockUpdate {
        product_id: product_id.to_owned(),
        created,
        plan,
    })
}

/// Returns `(history_id, created)` with the history row locked for the rest of
/// the transaction.
async fn lock_or_create_history(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &str,
) -> Result<(i64, bool), DbError> {
    let inserted: Option<i64> = sqlx::query_scalar::<_, i64>(
        "INSERT INTO stock_histories (product_id) \
         VALUES ($1) \
         ON CONFLICT (product_id) DO NOTHING \
         RETURNING id",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = inserted {
        return Ok((id, true));
    }

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM stock_histories WHERE product_id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok((id, false))
}

fn map_append_error(err: sqlx::Error, product_id: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DbError::WriteConflict {
            product_id: product_id.to_owned(),
        },
        _ => DbError::Sqlx(err),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns a product's history with entries oldest first, or `None` if the
/// product has never been observed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_stock_history(
    pool: &PgPool,
    product_id: &str,
) -> Result<Option<StockHistoryRecord>, DbError> {
    let history_id: Option<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM stock_histories WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;

    let Some(history_id) = history_id else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, StockHistoryEntryRow>(
        "SELECT id, history_id, recorded_at, sizes \
         FROM stock_history_entries \
         WHERE history_id = $1 \
         ORDER BY recorded_at ASC, id ASC",
    )
    .bind(history_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(StockHistoryRecord {
        product_id: product_id.to_owned(),
        stock_history: rows.into_iter().map(StockEntry::from).collect(),
    }))
}
