//! Integration tests for `CollectionClient` and the collection aggregator.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ttsdb_scraper::{fetch_all_collections, fetch_products, CollectionClient, ScraperError};

fn test_client(server: &MockServer) -> CollectionClient {
    CollectionClient::new(&server.uri(), 5, "ttsdb-test/0.1")
        .expect("failed to build test CollectionClient")
}

fn page_path(collection: &str) -> String {
    format!("/page-data/collection/{collection}/page-data.json")
}

/// Minimal `page-data.json` body listing the given `(handle, title, qty_s)` products.
fn page_body(products: &[(&str, &str, i64)]) -> serde_json::Value {
    let edges: Vec<serde_json::Value> = products
        .iter()
        .map(|(handle, title, qty)| {
            json!({
                "node": {
                    "id": format!("gid://shopify/Product/{handle}"),
                    "handle": handle,
                    "title": title,
                    "priceRange": {
                        "minVariantPrice": { "amount": "30000.0", "currencyCode": "JPY" }
                    },
                    "featuredImage": {
                        "originalSrc": format!("https://cdn.example.com/{handle}.jpg")
                    },
                    "options": [{ "name": "SIZE", "values": ["S", "M"] }],
                    "variants": { "edges": [
                        { "node": {
                            "quantityAvailable": qty,
                            "selectedOptions": [{ "name": "SIZE", "value": "S" }]
                        } }
                    ]}
                }
            })
        })
        .collect();

    json!({
        "result": { "serverData": { "data": { "collection": { "products": { "edges": edges } } } } }
    })
}

async fn mount_page(server: &MockServer, collection: &str, products: &[(&str, &str, i64)]) {
    Mock::given(method("GET"))
        .and(path(page_path(collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(products)))
        .mount(server)
        .await;
}

fn handles(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// fetch_collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_collection_returns_edges_in_upstream_order() {
    let server = MockServer::start().await;
    mount_page(&server, "lot-7-denim", &[("jeans", "Jeans", 1), ("jacket", "Jacket", 0)]).await;

    let edges = test_client(&server)
        .fetch_collection("lot-7-denim")
        .await
        .expect("fetch should succeed");

    let ids: Vec<&str> = edges.iter().map(|e| e.node.handle.as_str()).collect();
    assert_eq!(ids, vec!["jeans", "jacket"]);
}

#[tokio::test]
async fn fetch_collection_non_2xx_is_source_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("lot-1-tops")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_collection("lot-1-tops")
        .await
        .expect_err("503 should fail");

    assert!(
        matches!(
            err,
            ScraperError::UnexpectedStatus { status: 503, ref collection, .. }
                if collection == "lot-1-tops"
        ),
        "expected UnexpectedStatus(503), got: {err:?}"
    );
    assert!(err.is_source_unavailable());
}

#[tokio::test]
async fn fetch_collection_not_found_is_source_unavailable() {
    let server = MockServer::start().await;

    let err = test_client(&server)
        .fetch_collection("lot-9-unknown")
        .await
        .expect_err("unmatched path returns 404");

    assert!(matches!(err, ScraperError::UnexpectedStatus { status: 404, .. }));
    assert!(err.is_source_unavailable());
}

#[tokio::test]
async fn fetch_collection_unexpected_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(page_path("lot-1-tops")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "pageContext": {} } })),
        )
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_collection("lot-1-tops")
        .await
        .expect_err("shape mismatch should fail");

    assert!(matches!(err, ScraperError::MalformedPayload { .. }), "got: {err:?}");
    assert!(!err.is_source_unavailable());
}

#[tokio::test]
async fn fetch_collection_unreachable_host_is_source_unavailable() {
    // Port 9 (discard) on localhost is closed in test environments.
    let client = CollectionClient::new("http://127.0.0.1:9", 2, "ttsdb-test/0.1").unwrap();

    let err = client
        .fetch_collection("lot-1-tops")
        .await
        .expect_err("connection should be refused");

    assert!(
        matches!(err, ScraperError::SourceUnavailable { .. }),
        "expected SourceUnavailable, got: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// fetch_all_collections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aggregate_dedups_products_listed_in_two_collections() {
    let server = MockServer::start().await;
    mount_page(&server, "lot-1-tops", &[("logo-tee", "Logo Tee", 2), ("shirt", "Shirt", 1)]).await;
    mount_page(&server, "lot-6-jerseys", &[("logo-tee", "Logo Tee", 2)]).await;

    let report = fetch_all_collections(
        &test_client(&server),
        &handles(&["lot-1-tops", "lot-6-jerseys"]),
        0,
    )
    .await;

    assert_eq!(report.products.len(), 2);
    assert_eq!(
        report
            .products
            .iter()
            .filter(|p| p.product_id == "logo-tee")
            .count(),
        1
    );
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.failed_count(), 0);
}

#[tokio::test]
async fn aggregate_isolates_a_failing_collection() {
    let server = MockServer::start().await;
    mount_page(&server, "a", &[("alpha", "Alpha", 1)]).await;
    Mock::given(method("GET"))
        .and(path(page_path("b")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "c", &[("gamma", "Gamma", 1)]).await;

    let report = fetch_all_collections(&test_client(&server), &handles(&["a", "b", "c"]), 2).await;

    let ids: Vec<&str> = report.products.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "gamma"]);
    assert_eq!(report.failed_count(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.collection, "b");
    assert!(failure.result.as_ref().unwrap_err().is_source_unavailable());
}

#[tokio::test]
async fn aggregate_sorts_by_title() {
    let server = MockServer::start().await;
    mount_page(&server, "a", &[("z", "Zip Hoodie", 1), ("b", "Belt", 1)]).await;
    mount_page(&server, "b", &[("c", "Coat", 0)]).await;

    let report = fetch_all_collections(&test_client(&server), &handles(&["a", "b"]), 1).await;

    let titles: Vec<&str> = report.products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Belt", "Coat", "Zip Hoodie"]);
}

#[tokio::test]
async fn aggregate_never_fetches_the_all_pseudo_collection() {
    let server = MockServer::start().await;
    mount_page(&server, "a", &[("alpha", "Alpha", 1)]).await;
    Mock::given(method("GET"))
        .and(path(page_path("all")))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let report = fetch_all_collections(&test_client(&server), &handles(&["all", "a"]), 0).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.products.len(), 1);
}

#[tokio::test]
async fn aggregate_extracts_sizes() {
    let server = MockServer::start().await;
    mount_page(&server, "a", &[("alpha", "Alpha", 3)]).await;

    let report = fetch_all_collections(&test_client(&server), &handles(&["a"]), 0).await;

    let sizes = report.products[0].size_map();
    assert_eq!(sizes["S"], 3);
    assert_eq!(sizes["M"], 0);
}

// ---------------------------------------------------------------------------
// fetch_products
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_products_all_resolves_to_aggregate() {
    let server = MockServer::start().await;
    mount_page(&server, "a", &[("alpha", "Alpha", 1)]).await;
    mount_page(&server, "b", &[("beta", "Beta", 1), ("alpha", "Alpha", 1)]).await;

    let products = fetch_products(&test_client(&server), "all", &handles(&["a", "b"]), 0)
        .await
        .expect("aggregate never fails");

    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn fetch_products_single_collection_propagates_errors() {
    let server = MockServer::start().await;

    let result = fetch_products(&test_client(&server), "missing", &handles(&["missing"]), 0).await;

    assert!(result.is_err());
}
