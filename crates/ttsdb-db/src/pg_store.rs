use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ttsdb_core::{SizeStock, SnapshotRow, StockChangeEvent};

use crate::store::{
    SnapshotInsertReport, SnapshotStore, StockHistoryRecord, StockStore, StockUpdate,
};
use crate::{snapshots, stock_events, stock_history, DbError};

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StockStore for PgStore {
    async fn apply_snapshot(
        &self,
        product_id: &str,
        sizes: &[SizeStock],
        recorded_at: DateTime<Utc>,
    ) -> Result<StockUpdate, DbError> {
        stock_history::apply_stock_snapshot(&self.pool, product_id, sizes, recorded_at).await
    }

    async fn stock_history(
        &self,
        product_id: &str,
    ) -> Result<Option<StockHistoryRecord>, DbError> {
        stock_history::get_stock_history(&self.pool, product_id).await
    }

    async fn stock_events(
        &self,
        product_id: &str,
        limit: i64,
    ) -> Result<Vec<StockChangeEvent>, DbError> {
        let rows = stock_events::list_stock_events(&self.pool, product_id, limit).await?;
        Ok(rows.into_iter().map(StockChangeEvent::from).collect())
    }
}

#[async_trait]
impl SnapshotStore for PgStore {
    async fn insert_snapshot_rows(
        &self,
        rows: &[SnapshotRow],
    ) -> Result<SnapshotInsertReport, DbError> {
        snapshots::insert_snapshot_rows(&self.pool, rows).await
    }
}
