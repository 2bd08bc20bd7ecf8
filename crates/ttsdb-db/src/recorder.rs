use chrono::{DateTime, Utc};
use ttsdb_core::{flatten_snapshot, ProductSnapshot};

use crate::store::{SnapshotInsertReport, SnapshotStore};
use crate::DbError;

/// Writes one time-series row per product and size, all stamped with
/// `recorded_at`, whether or not the quantities changed.
///
/// # Errors
///
/// Returns the store error when the insert cannot run at all. Rows that
/// collide with existing keys or are rejected by the store are counted in the
/// report instead.
pub async fn record_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    products: &[ProductSnapshot],
    recorded_at: DateTime<Utc>,
) -> Result<SnapshotInsertReport, DbError> {
    let rows = flatten_snapshot(products, recorded_at);
    let report = store.insert_snapshot_rows(&rows).await?;

    if report.skipped > 0 {
        tracing::warn!(
            inserted = report.inserted,
            skipped = report.skipped,
            "some snapshot rows were skipped"
        );
    } else {
        tracing::info!(inserted = report.inserted, "snapshot recorded");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ttsdb_core::SizeStock;

    use super::*;
    use crate::InMemoryStore;

    fn product(id: &str, sizes: &[(&str, i32)]) -> ProductSnapshot {
        ProductSnapshot {
            product_id: id.to_string(),
            source_id: String::new(),
            title: id.to_string(),
            price: "1.0".to_string(),
            currency_code: "JPY".to_string(),
            image_url: None,
            gallery: vec![],
            color: String::new(),
            url: String::new(),
            sizes: sizes
                .iter()
                .map(|(size, quantity)| SizeStock {
                    size: (*size).to_string(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn one_row_per_product_and_size_every_run() {
        let store = InMemoryStore::new();
        let products = vec![product("tee", &[("S", 1), ("M", 0)]), product("cap", &[("F", 2)])];

        let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let second_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

        let first = record_snapshot(&store, &products, first_at).await.unwrap();
        let second = record_snapshot(&store, &products, second_at).await.unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(second.inserted, 3);
        let rows = store.all_snapshot_rows().await;
        assert_eq!(rows.len(), 6);
        assert!(rows[..3].iter().all(|r| r.recorded_at == first_at));
    }

    #[tokio::test]
    async fn replaying_a_timestamp_skips_rows_without_failing() {
        let store = InMemoryStore::new();
        let products = vec![product("tee", &[("S", 1)])];
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        record_snapshot(&store, &products, at).await.unwrap();
        let replay = record_snapshot(&store, &products, at).await.unwrap();

        assert_eq!(replay, SnapshotInsertReport { inserted: 0, skipped: 1 });
    }
}
