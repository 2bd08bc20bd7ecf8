//! Batch driver for the stock history store.

use chrono::{DateTime, Utc};
use ttsdb_core::{ProductSnapshot, StockPlan};

use crate::store::StockStore;
use crate::DbError;

/// A product whose update was rejected by the store.
#[derive(Debug)]
pub struct ProductFailure {
    pub product_id: String,
    pub error: DbError,
}

/// Tally of one [`update_stock_history`] batch.
#[derive(Debug, Default)]
pub struct HistoryBatchReport {
    /// Products seen for the first time.
    pub created: usize,
    /// Existing products whose sizes moved.
    pub changed: usize,
    pub unchanged: usize,
    pub failures: Vec<ProductFailure>,
    pub events_written: usize,
}

impl HistoryBatchReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.created + self.changed + self.unchanged
    }
}

/// Applies every snapshot to its product's history, one product at a time.
///
/// A store error scoped to one product is logged, recorded in
/// [`HistoryBatchReport::failures`], and the batch moves on. Nothing partial
/// is left for that product since each apply is atomic.
///
/// # Errors
///
/// Stops and returns the error when the store itself is unreachable; the
/// remaining products would fail the same way.
pub async fn update_stock_history<S: StockStore + ?Sized>(
    store: &S,
    products: &[ProductSnapshot],
    recorded_at: DateTime<Utc>,
) -> Result<HistoryBatchReport, DbError> {
    let mut report = HistoryBatchReport::default();

    for product in products {
        match store
            .apply_snapshot(&product.product_id, &product.sizes, recorded_at)
            .await
        {
            Ok(update) => {
                report.events_written += update.events_written();
                match &update.plan {
                    StockPlan::Unchanged => report.unchanged += 1,
                    StockPlan::FirstObservation(_) | StockPlan::Changed(_)
                        if update.created =>
                    {
                        report.created += 1;
                    }
                    StockPlan::FirstObservation(_) | StockPlan::Changed(_) => {
                        report.changed += 1;
                    }
                }
                tracing::debug!(
                    product_id = %product.product_id,
                    created = update.created,
                    events = update.events_written(),
                    "stock history applied"
                );
            }
            Err(e) if e.is_store_unavailable() => {
                tracing::error!(
                    product_id = %product.product_id,
                    error = %e,
                    "store unreachable; aborting history batch"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::error!(
                    product_id = %product.product_id,
                    error = %e,
                    "stock history update failed"
                );
                report.failures.push(ProductFailure {
                    product_id: product.product_id.clone(),
                    error: e,
                });
            }
        }
    }

    tracing::info!(
        created = report.created,
        changed = report.changed,
        unchanged = report.unchanged,
        failed = report.failed(),
        events = report.events_written,
        "stock history batch complete"
    );

    Ok(report)
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
