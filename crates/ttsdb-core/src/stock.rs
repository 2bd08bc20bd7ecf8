//! Stock-history change detection.
//!
//! [`plan_stock_update`] is the pure decision at the heart of the history
//! store: given the sizes of the last persisted entry (if any) and the sizes
//! of the current observation, it says whether a new entry must be appended
//! and which per-size change events go with it. Stores call it while holding
//! the per-product lock so the read, the decision and the append happen as
//! one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::products::{SizeMap, SizeStock};

/// One timestamped entry in a product's stock history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub recorded_at: DateTime<Utc>,
    pub sizes: SizeMap,
}

/// A single size whose quantity moved between two consecutive entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub size: String,
    pub old_stock: i32,
    pub new_stock: i32,
}

/// A persisted [`StockChange`] tied to a product and the run timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChangeEvent {
    pub recorded_at: DateTime<Utc>,
    pub product_id: String,
    pub size: String,
    pub old_stock: i32,
    pub new_stock: i32,
}

impl StockChangeEvent {
    #[must_use]
    pub fn from_change(
        product_id: &str,
        recorded_at: DateTime<Utc>,
        change: &StockChange,
    ) -> Self {
        Self {
            recorded_at,
            product_id: product_id.to_owned(),
            size: change.size.clone(),
            old_stock: change.old_stock,
            new_stock: change.new_stock,
        }
    }

    /// `true` for a sold-out → in-stock transition.
    #[must_use]
    pub fn is_restock(&self) -> bool {
        self.old_stock == 0 && self.new_stock > 0
    }

    /// `true` for an in-stock → sold-out transition.
    #[must_use]
    pub fn is_sellout(&self) -> bool {
        self.old_stock > 0 && self.new_stock == 0
    }
}

/// What the history store has to do for one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockPlan {
    /// Effective quantities match the last entry; write nothing.
    Unchanged,
    /// No prior entry. Append one and emit an event per size from zero,
    /// including sizes that are still at zero.
    FirstObservation(Vec<StockChange>),
    /// Quantities moved. Append one entry and emit an event per moved size.
    Changed(Vec<StockChange>),
}

impl StockPlan {
    #[must_use]
    pub fn appends_entry(&self) -> bool {
        !matches!(self, StockPlan::Unchanged)
    }

    #[must_use]
    pub fn changes(&self) -> &[StockChange] {
        match self {
            StockPlan::Unchanged => &[],
            StockPlan::FirstObservation(changes) | StockPlan::Changed(changes) => changes,
        }
    }
}

/// Decide how the history of one product moves given its last entry.
///
/// Sizes missing on either side count as zero, so adding or dropping a size
/// label only registers when the effective quantity differs. Events follow the
/// current declaration order, then any sizes that disappeared.
#[must_use]
pub fn plan_stock_update(last: Option<&SizeMap>, current: &[SizeStock]) -> StockPlan {
    let Some(last) = last else {
        return StockPlan::FirstObservation(
            current
                .iter()
                .map(|s| StockChange {
                    size: s.size.clone(),
                    old_stock: 0,
                    new_stock: s.quantity,
                })
                .collect(),
        );
    };

    let mut changes: Vec<StockChange> = current
        .iter()
        .filter_map(|s| {
            let old_stock = last.get(&s.size).copied().unwrap_or(0);
            (old_stock != s.quantity).then(|| StockChange {
                size: s.size.clone(),
                old_stock,
                new_stock: s.quantity,
            })
        })
        .collect();

    for (size, &old_stock) in last {
        let still_declared = current.iter().any(|s| &s.size == size);
        if !still_declared && old_stock != 0 {
            changes.push(StockChange {
                size: size.clone(),
                old_stock,
                new_stock: 0,
            });
        }
    }

    if changes.is_empty() {
        StockPlan::Unchanged
    } else {
        StockPlan::Changed(changes)
    }
}

#[cfg(test)]
#[path = "stock_test.rs"]
mod tests;
