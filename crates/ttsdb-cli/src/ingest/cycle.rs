//! One ingestion cycle: aggregate every collection, apply the results to
//! stock history, and optionally record the flat snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use ttsdb_db::{
    record_snapshot, update_stock_history, DbError, HistoryBatchReport, SnapshotInsertReport,
    SnapshotStore, StockStore,
};
use ttsdb_scraper::{fetch_all_collections, CollectionClient, CollectionOutcome};

/// The store became unreachable mid-cycle. Carries the collection outcomes
/// gathered before the abort so the run audit can still record them.
#[derive(Debug, thiserror::Error)]
#[error("ingestion cycle aborted: {source}")]
pub(crate) struct CycleAborted {
    pub outcomes: Vec<CollectionOutcome>,
    #[source]
    pub source: DbError,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CycleOptions {
    pub max_concurrent: usize,
    pub record_snapshots: bool,
}

/// Everything one cycle did, for the run audit rows and the printed summary.
#[derive(Debug)]
pub(crate) struct CycleSummary {
    pub recorded_at: DateTime<Utc>,
    pub outcomes: Vec<CollectionOutcome>,
    pub products: usize,
    pub duplicates_dropped: usize,
    pub history: HistoryBatchReport,
    pub snapshot: Option<SnapshotInsertReport>,
}

impl CycleSummary {
    pub fn collections_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn collections_succeeded(&self) -> usize {
        self.outcomes.len() - self.collections_failed()
    }

    pub fn all_collections_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.collections_succeeded() == 0
    }

    pub fn products_processed(&self) -> i32 {
        i32::try_from(self.history.processed()).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ingested at {}",
            self.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "collections: {} ok, {} failed",
            self.collections_succeeded(),
            self.collections_failed()
        )?;
        writeln!(
            f,
            "products: {} ({} duplicate listings dropped)",
            self.products, self.duplicates_dropped
        )?;
        writeln!(
            f,
            "history: {} new, {} changed, {} unchanged, {} failed",
            self.history.created,
            self.history.changed,
            self.history.unchanged,
            self.history.failed()
        )?;
        write!(f, "events written: {}", self.history.events_written)?;
        if let Some(snapshot) = &self.snapshot {
            write!(
                f,
                "\nsnapshot rows: {} inserted, {} skipped",
                snapshot.inserted, snapshot.skipped
            )?;
        }
        Ok(())
    }
}

/// Runs one cycle against `store` with every write stamped `recorded_at`.
///
/// Collection failures are carried in the summary, never returned. When every
/// collection failed the store is left untouched. A snapshot failure that is
/// not a lost connection is logged and leaves `snapshot` empty; the history
/// written before it stands.
///
/// # Errors
///
/// Only when the store becomes unreachable mid-cycle.
pub(crate) async fn run_ingestion_cycle<S>(
    client: &CollectionClient,
    collections: &[String],
    store: &S,
    options: CycleOptions,
    recorded_at: DateTime<Utc>,
) -> Result<CycleSummary, CycleAborted>
where
    S: StockStore + SnapshotStore,
{
    let report = fetch_all_collections(client, collections, options.max_concurrent).await;

    let mut summary = CycleSummary {
        recorded_at,
        products: report.products.len(),
        duplicates_dropped: report.duplicates_dropped,
        outcomes: Vec::new(),
        history: HistoryBatchReport::default(),
        snapshot: None,
    };

    if report.all_failed() {
        tracing::error!(
            collections = report.outcomes.len(),
            "every collection failed; skipping history update"
        );
        summary.outcomes = report.outcomes;
        return Ok(summary);
    }

    summary.history = match update_stock_history(store, &report.products, recorded_at).await {
        Ok(history) => history,
        Err(source) => {
            return Err(CycleAborted {
                outcomes: report.outcomes,
                source,
            })
        }
    };

    if options.record_snapshots {
        match record_snapshot(store, &report.products, recorded_at).await {
            Ok(snapshot) => summary.snapshot = Some(snapshot),
            Err(source) if source.is_store_unavailable() => {
                return Err(CycleAborted {
                    outcomes: report.outcomes,
                    source,
                });
            }
            Err(e) => tracing::error!(
                error = %e,
                "snapshot recording failed; stock history already written"
            ),
        }
    }

    summary.outcomes = report.outcomes;
    Ok(summary)
}

#[cfg(test)]
#[path = "cycle_test.rs"]
mod tests;
