//! Storage seams used by the ingestion cycle.
//!
//! [`StockStore`] owns the per-product read-then-conditionally-append step and
//! [`SnapshotStore`] owns the flat time series. Both are implemented for
//! Postgres ([`crate::PgStore`]) and in memory ([`crate::InMemoryStore`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ttsdb_core::{SizeStock, SnapshotRow, StockChangeEvent, StockEntry, StockPlan};

use crate::DbError;

/// Result of applying one product's observation to its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: String,
    /// `true` when this call created the product's history record.
    pub created: bool,
    pub plan: StockPlan,
}

impl StockUpdate {
    #[must_use]
    pub fn events_written(&self) -> usize {
        if self.plan.appends_entry() {
            self.plan.changes().len()
        } else {
            0
        }
    }
}

/// A product's full history, oldest entry first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockHistoryRecord {
    pub product_id: String,
    pub stock_history: Vec<StockEntry>,
}

impl StockHistoryRecord {
    #[must_use]
    pub fn last_entry(&self) -> Option<&StockEntry> {
        self.stock_history.last()
    }
}

/// Outcome of a best-effort bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotInsertReport {
    pub inserted: u64,
    pub skipped: u64,
}

#[async_trait]
pub trait StockStore: Send + Sync {
    /// Reads the product's last entry, decides with
    /// [`ttsdb_core::plan_stock_update`], and appends the entry plus its change
    /// events when the sizes moved. The whole step is atomic per product: a
    /// failure leaves no partial entry behind.
    ///
    /// # Errors
    ///
    /// [`DbError::WriteConflict`] when an entry with the same timestamp was
    /// appended concurrently, or any underlying store error.
    async fn apply_snapshot(
        &self,
        product_id: &str,
        sizes: &[SizeStock],
        recorded_at: DateTime<Utc>,
    ) -> Result<StockUpdate, DbError>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn stock_history(&self, product_id: &str)
        -> Result<Option<StockHistoryRecord>, DbError>;

    /// Change events for one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn stock_events(
        &self,
        product_id: &str,
        limit: i64,
    ) -> Result<Vec<StockChangeEvent>, DbError>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts every row it can. Rows that collide with an existing
    /// `(recorded_at, product_id, size)` key, or that the store rejects, are
    /// skipped and counted.
    ///
    /// # Errors
    ///
    /// Only when the store itself fails; per-row failures are not errors.
    async fn insert_snapshot_rows(
        &self,
        rows: &[SnapshotRow],
    ) -> Result<SnapshotInsertReport, DbError>;
}
