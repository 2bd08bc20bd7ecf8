use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Size label → available quantity. Ordered so persisted JSON and comparisons
/// are stable regardless of declaration order upstream.
pub type SizeMap = BTreeMap<String, i32>;

/// Available quantity for one declared size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: String,
    /// Never negative; the extractor clamps oversold counts to zero.
    pub quantity: i32,
}

/// One product as observed at a single point in time, normalized from the
/// upstream collection payload.
///
/// Only `product_id` and `sizes` take part in change detection. The remaining
/// fields are carried through for display and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Upstream product handle, e.g. `"denim-jacket-indigo"`. Stable across
    /// collections.
    pub product_id: String,
    /// Opaque upstream node id (`gid://shopify/Product/...`).
    pub source_id: String,
    pub title: String,
    /// Minimum variant price as the decimal string upstream returns.
    pub price: String,
    /// ISO 4217 currency code, e.g. `"JPY"`.
    pub currency_code: String,
    pub image_url: Option<String>,
    /// Featured image first, then any additional images.
    pub gallery: Vec<String>,
    /// First value of the first option group named "color"; empty when absent.
    pub color: String,
    /// Canonical storefront page for the product.
    pub url: String,
    /// Declared sizes in upstream order, labels unique.
    pub sizes: Vec<SizeStock>,
}

impl ProductSnapshot {
    /// The per-size quantities as a map, the shape stored in stock history.
    #[must_use]
    pub fn size_map(&self) -> SizeMap {
        self.sizes
            .iter()
            .map(|s| (s.size.clone(), s.quantity))
            .collect()
    }

    /// Sum of available units over every size.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.sizes.iter().map(|s| i64::from(s.quantity)).sum()
    }

    /// `true` when no declared size has stock. Products with no size options
    /// count as sold out.
    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.sizes.iter().all(|s| s.quantity == 0)
    }

    /// Labels of sizes with at least one unit available, in declared order.
    #[must_use]
    pub fn in_stock_sizes(&self) -> Vec<&str> {
        self.sizes
            .iter()
            .filter(|s| s.quantity > 0)
            .map(|s| s.size.as_str())
            .collect()
    }
}
