pub mod aggregate;
pub mod client;
pub mod error;
pub mod extract;
pub mod types;

pub use aggregate::{fetch_all_collections, fetch_products, AggregateReport, CollectionOutcome};
pub use client::CollectionClient;
pub use error::ScraperError;
pub use extract::{display_title, extract_product, product_url};
pub use types::{CollectionPageData, ProductEdge, ProductNode};
