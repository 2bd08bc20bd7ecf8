//! In-process store for tests and dry runs.
//!
//! All state sits behind one [`tokio::sync::Mutex`], so each
//! [`StockStore::apply_snapshot`] call reads, decides and appends without
//! another caller interleaving, which mirrors the row lock the Postgres
//! store takes.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use ttsdb_core::{
    plan_stock_update, SizeMap, SizeStock, SnapshotRow, StockChangeEvent, StockEntry,
};

use crate::store::{
    SnapshotInsertReport, SnapshotStore, StockHistoryRecord, StockStore, StockUpdate,
};
use crate::DbError;

type SnapshotKey = (DateTime<Utc>, String, String);

#[derive(Debug, Default)]
struct State {
    histories: HashMap<String, Vec<StockEntry>>,
    events: Vec<StockChangeEvent>,
    snapshot_keys: BTreeSet<SnapshotKey>,
    snapshots: Vec<SnapshotRow>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change event written so far, in write order.
    pub async fn all_events(&self) -> Vec<StockChangeEvent> {
        self.state.lock().await.events.clone()
    }

    /// Every snapshot row written so far, in write order.
    pub async fn all_snapshot_rows(&self) -> Vec<SnapshotRow> {
        self.state.lock().await.snapshots.clone()
    }

    pub async fn product_count(&self) -> usize {
        self.state.lock().await.histories.len()
    }

    pub async fn entry_count(&self) -> usize {
        self.state
            .lock()
            .await
            .histories
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn apply_snapshot(
        &self,
        product_id: &str,
        sizes: &[SizeStock],
        recorded_at: DateTime<Utc>,
    ) -> Result<StockUpdate, DbError> {
        let mut state = self.state.lock().await;

        let created = !state.histories.contains_key(product_id);
        let plan = {
            let entries = state.histories.get(product_id);
            let last = entries.and_then(|e| e.last()).map(|e| &e.sizes);
            plan_stock_update(last, sizes)
        };

        if plan.appends_entry() {
            let duplicate = state
                .histories
                .get(product_id)
                .is_some_and(|entries| entries.iter().any(|e| e.recorded_at == recorded_at));
            if duplicate {
                return Err(DbError::WriteConflict {
                    product_id: product_id.to_owned(),
                });
            }

            let current: SizeMap = sizes.iter().map(|s| (s.size.clone(), s.quantity)).collect();
            state
                .histories
                .entry(product_id.to_owned())
                .or_default()
                .push(StockEntry {
                    recorded_at,
                    sizes: current,
                });
            let events = plan
                .changes()
                .iter()
                .map(|change| StockChangeEvent::from_change(product_id, recorded_at, change));
            state.events.extend(events);
        } else {
            state.histories.entry(product_id.to_owned()).or_default();
        }

        Ok(StockUpdate {
            product_id: product_id.to_owned(),
            created,
            plan,
        })
    }

    async fn stock_history(
        &self,
        product_id: &str,
    ) -> Result<Option<StockHistoryRecord>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .histories
            .get(product_id)
            .map(|entries| StockHistoryRecord {
                product_id: product_id.to_owned(),
                stock_history: entries.clone(),
            }))
    }

    async fn stock_events(
        &self,
        product_id: &str,
        limit: i64,
    ) -> Result<Vec<StockChangeEvent>, DbError> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let mut events: Vec<StockChangeEvent> = state
            .events
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect();
        // Stable sort keeps write order within one timestamp.
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        events.truncate(limit);
        Ok(events)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn insert_snapshot_rows(
        &self,
        rows: &[SnapshotRow],
    ) -> Result<SnapshotInsertReport, DbError> {
        let mut state = self.state.lock().await;
        let mut report = SnapshotInsertReport::default();

        for row in rows {
            let key = (row.recorded_at, row.product_id.clone(), row.size.clone());
            if state.snapshot_keys.insert(key) {
                state.snapshots.push(row.clone());
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        Ok(report)
    }
}
