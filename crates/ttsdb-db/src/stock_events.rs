//! Read queries over `stock_change_events`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ttsdb_core::StockChangeEvent;

use crate::DbError;

/// A row from the `stock_change_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockChangeEventRow {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub product_id: String,
    pub size: String,
    pub old_stock: i32,
    pub new_stock: i32,
}

impl From<StockChangeEventRow> for StockChangeEvent {
    fn from(row: StockChangeEventRow) -> Self {
        Self {
            recorded_at: row.recorded_at,
            product_id: row.product_id,
            size: row.size,
            old_stock: row.old_stock,
            new_stock: row.new_stock,
        }
    }
}

/// Events for one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stock_events(
    pool: &PgPool,
    product_id: &str,
    limit: i64,
) -> Result<Vec<StockChangeEventRow>, DbError> {
    let rows = sqlx::query_as::<_, StockChangeEventRow>(
        "SELECT id, recorded_at, product_id, size, old_stock, new_stock \
         FROM stock_change_events \
         WHERE product_id = $1 \
         ORDER BY recorded_at DESC, id ASC \
         LIMIT $2",
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Most recent events across all products.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_stock_events(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<StockChangeEventRow>, DbError> {
    let rows = sqlx::query_as::<_, StockChangeEventRow>(
        "SELECT id, recorded_at, product_id, size, old_stock, new_stock \
         FROM stock_change_events \
         ORDER BY recorded_at DESC, id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
