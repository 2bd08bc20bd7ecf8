//! Concurrent fan-out over every configured collection.
//!
//! Each collection is fetched and extracted in its own future; no state is
//! shared between them. Results are merged sequentially once every future has
//! finished, so deduplication and sorting never race.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use ttsdb_core::{ProductSnapshot, ALL_COLLECTION};

use crate::client::CollectionClient;
use crate::error::ScraperError;
use crate::extract::extract_product;

/// Result of fetching a single collection: the number of products it listed,
/// or the error that stopped it.
#[derive(Debug)]
pub struct CollectionOutcome {
    pub collection: String,
    pub result: Result<usize, ScraperError>,
}

impl CollectionOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Merged output of [`fetch_all_collections`].
#[derive(Debug, Default)]
pub struct AggregateReport {
    /// Unique products sorted by title.
    pub products: Vec<ProductSnapshot>,
    /// One entry per fetched collection, in completion order.
    pub outcomes: Vec<CollectionOutcome>,
    /// Listings dropped because the product had already arrived from
    /// another collection.
    pub duplicates_dropped: usize,
}

impl AggregateReport {
    pub fn failures(&self) -> impl Iterator<Item = &CollectionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.len() - self.failed_count()
    }

    /// `true` when there was at least one collection and none succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded_count() == 0
    }
}

/// Fetches every collection in `collections` concurrently and merges the
/// extracted products.
///
/// At most `max_concurrent` fetches are in flight; `0` runs one per
/// collection. The reserved [`ALL_COLLECTION`] handle is skipped so the
/// aggregate can never fetch itself.
///
/// A collection that fails is recorded in [`AggregateReport::outcomes`] and
/// logged; the other collections are still merged. Products are deduplicated
/// by `product_id` with the first arrival kept. Arrival order follows fetch
/// completion, so which listing represents a product seen in several
/// collections is not guaranteed.
pub async fn fetch_all_collections(
    client: &CollectionClient,
    collections: &[String],
    max_concurrent: usize,
) -> AggregateReport {
    let targets: Vec<&str> = collections
        .iter()
        .map(String::as_str)
        .filter(|c| {
            if c.eq_ignore_ascii_case(ALL_COLLECTION) {
                tracing::warn!(
                    collection = %c,
                    "skipping aggregate pseudo-collection in fan-out"
                );
                false
            } else {
                true
            }
        })
        .collect();

    let limit = if max_concurrent == 0 {
        targets.len().max(1)
    } else {
        max_concurrent
    };
    let base_url = client.base_url();

    let results: Vec<(&str, Result<Vec<ProductSnapshot>, ScraperError>)> = stream::iter(targets)
        .map(|collection| async move {
            let result = client.fetch_collection(collection).await.map(|edges| {
                edges
                    .iter()
                    .map(|edge| extract_product(&edge.node, base_url))
                    .collect::<Vec<_>>()
            });
            match &result {
                Ok(products) => tracing::info!(
                    collection,
                    products = products.len(),
                    "collection fetched"
                ),
                Err(e) => tracing::error!(
                    collection,
                    error = %e,
                    "collection fetch failed"
                ),
            }
            (collection, result)
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    merge_collections(results)
}

/// Fetches the products of one collection, resolving [`ALL_COLLECTION`] to
/// the merged view over `configured`.
///
/// # Errors
///
/// For a single collection, propagates the fetch error. The aggregate view
/// never fails; per-collection failures are logged and left out.
pub async fn fetch_products(
    client: &CollectionClient,
    collection: &str,
    configured: &[String],
    max_concurrent: usize,
) -> Result<Vec<ProductSnapshot>, ScraperError> {
    if collection.eq_ignore_ascii_case(ALL_COLLECTION) {
        return Ok(fetch_all_collections(client, configured, max_concurrent)
            .await
            .products);
    }

    let edges = client.fetch_collection(collection).await?;
    Ok(edges
        .iter()
        .map(|edge| extract_product(&edge.node, client.base_url()))
        .collect())
}

/// Sequential merge step: first-arrival dedup by `product_id`, then a stable
/// sort by title.
pub(crate) fn merge_collections<S: Into<String>>(
    results: Vec<(S, Result<Vec<ProductSnapshot>, ScraperError>)>,
) -> AggregateReport {
    let mut seen: HashSet<String> = HashSet::new();
    let mut report = AggregateReport::default();

    for (collection, result) in results {
        let collection = collection.into();
        match result {
            Ok(products) => {
                let listed = products.len();
                for product in products {
                    if seen.insert(product.product_id.clone()) {
                        report.products.push(product);
                    } else {
                        tracing::debug!(
                            collection = %collection,
                            product_id = %product.product_id,
                            "dropping duplicate listing"
                        );
                        report.duplicates_dropped += 1;
                    }
                }
                report.outcomes.push(CollectionOutcome {
                    collection,
                    result: Ok(listed),
                });
            }
            Err(e) => report.outcomes.push(CollectionOutcome {
                collection,
                result: Err(e),
            }),
        }
    }

    report.products.sort_by(|a, b| a.title.cmp(&b.title));
    report
}

#[cfg(test)]
mod tests {
    use ttsdb_core::SizeStock;

    use super::*;

    fn product(id: &str, title: &str, qty: i32) -> ProductSnapshot {
        ProductSnapshot {
            product_id: id.to_string(),
            source_id: format!("gid://shopify/Product/{id}"),
            title: title.to_string(),
            price: "10000.0".to_string(),
            currency_code: "JPY".to_string(),
            image_url: None,
            gallery: vec![],
            color: String::new(),
            url: String::new(),
            sizes: vec![SizeStock {
                size: "M".to_string(),
                quantity: qty,
            }],
        }
    }

    fn malformed(collection: &str) -> ScraperError {
        ScraperError::MalformedPayload {
            collection: collection.to_string(),
            reason: "test".to_string(),
        }
    }

    #[test]
    fn duplicate_ids_keep_first_arrival() {
        let report = merge_collections(vec![
            ("lot-1-tops", Ok(vec![product("tee", "Tee", 1)])),
            ("lot-6-jerseys", Ok(vec![product("tee", "TEE", 9)])),
        ]);
        assert_eq!(report.products.len(), 1);
        assert_eq!(report.products[0].title, "Tee");
        assert_eq!(report.products[0].sizes[0].quantity, 1);
        assert_eq!(report.duplicates_dropped, 1);
    }

    #[test]
    fn products_are_sorted_by_title() {
        let report = merge_collections(vec![
            (
                "a",
                Ok(vec![product("z", "Zip Hoodie", 1), product("c", "Coat", 1)]),
            ),
            ("b", Ok(vec![product("j", "Jacket", 1)])),
        ]);
        let titles: Vec<&str> = report.products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Coat", "Jacket", "Zip Hoodie"]);
    }

    #[test]
    fn failed_collection_does_not_drop_others() {
        let report = merge_collections(vec![
            ("a", Ok(vec![product("x", "X", 1)])),
            ("b", Err(malformed("b"))),
            ("c", Ok(vec![product("y", "Y", 1)])),
        ]);
        assert_eq!(report.products.len(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.succeeded_count(), 2);
        assert!(!report.all_failed());
        let failed: Vec<&str> = report.failures().map(|o| o.collection.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
    }

    #[test]
    fn all_failed_only_when_every_collection_failed() {
        let report =
            merge_collections(vec![("a", Err(malformed("a"))), ("b", Err(malformed("b")))]);
        assert!(report.all_failed());
        assert!(report.products.is_empty());

        let empty = merge_collections::<&str>(vec![]);
        assert!(!empty.all_failed());
    }

    #[test]
    fn outcome_counts_listed_products_including_duplicates() {
        let report = merge_collections(vec![
            ("a", Ok(vec![product("x", "X", 1)])),
            ("b", Ok(vec![product("x", "X", 1), product("y", "Y", 0)])),
        ]);
        let counts: Vec<usize> = report
            .outcomes
            .iter()
            .map(|o| *o.result.as_ref().unwrap())
            .collect();
        assert_eq!(counts, vec![1, 2]);
        assert_eq!(report.products.len(), 2);
    }
}
