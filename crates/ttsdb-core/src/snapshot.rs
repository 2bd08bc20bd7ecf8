use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::products::ProductSnapshot;

/// One product × size quantity at a capture instant, for the time-series table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub recorded_at: DateTime<Utc>,
    pub product_id: String,
    pub size: String,
    pub quantity: i32,
}

/// Flatten aggregated products into one row per product × size, all stamped
/// with the same `recorded_at`. Products without sizes contribute no rows.
#[must_use]
pub fn flatten_snapshot(
    products: &[ProductSnapshot],
    recorded_at: DateTime<Utc>,
) -> Vec<SnapshotRow> {
    products
        .iter()
        .flat_map(|product| {
            product.sizes.iter().map(move |s| SnapshotRow {
                recorded_at,
                product_id: product.product_id.clone(),
                size: s.size.clone(),
                quantity: s.quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::SizeStock;

    fn product(id: &str, sizes: &[(&str, i32)]) -> ProductSnapshot {
        ProductSnapshot {
            product_id: id.to_string(),
            source_id: format!("gid://shopify/Product/{id}"),
            title: id.to_string(),
            price: "1000.0".to_string(),
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

    #[test]
    fn one_row_per_product_and_size() {
        let at = Utc::now();
        let rows = flatten_snapshot(
            &[product("a", &[("S", 1), ("M", 0)]), product("b", &[("F", 3)])],
            at,
        );
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.recorded_at == at));
        assert_eq!(rows[0].product_id, "a");
        assert_eq!(rows[1].size, "M");
        assert_eq!(rows[1].quantity, 0);
        assert_eq!(rows[2].product_id, "b");
    }

    #[test]
    fn sizeless_products_are_skipped() {
        let rows = flatten_snapshot(&[product("bag", &[])], Utc::now());
        assert!(rows.is_empty());
    }
}
