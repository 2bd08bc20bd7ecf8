//! Response types for the storefront's per-collection `page-data.json`.
//!
//! ## Observed shape
//!
//! The storefront is a statically built site backed by a Shopify catalog.
//! Every collection page ships its data as
//! `/page-data/collection/<handle>/page-data.json`, and the products sit at
//! `result.serverData.data.collection.products.edges[].node`. Everything
//! outside that path is ignored.
//!
//! ### `quantityAvailable`
//! Integer per variant. Shopify reports oversold variants with negative
//! counts and untracked inventory as `null`; both are read as zero stock by
//! the extractor.
//!
//! ### `selectedOptions`
//! Ordered as the product's option groups. Only the first entry is consulted
//! when matching a variant to a size, which holds for this catalog because
//! size is always the first option group.
//!
//! ### `priceRange.minVariantPrice.amount`
//! Usually a decimal string (`"52000.0"`), occasionally a bare number. Both
//! are accepted and kept as text.
//!
//! ### `collection`
//! `null` when the handle does not exist; surfaced as a malformed payload by
//! the client.

use serde::{Deserialize, Deserializer};

/// Top-level `page-data.json` document.
#[derive(Debug, Deserialize)]
pub struct CollectionPageData {
    pub result: PageResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub server_data: ServerData,
}

#[derive(Debug, Deserialize)]
pub struct ServerData {
    pub data: CollectionQuery,
}

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    #[serde(default)]
    pub collection: Option<CollectionData>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionData {
    pub products: Connection<ProductNode>,
}

/// GraphQL-style connection wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

/// A raw product edge as returned for one collection.
pub type ProductEdge = Edge<ProductNode>;

/// A single product from a collection listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNode {
    /// Opaque node id, e.g. `"gid://shopify/Product/7012345678901"`.
    pub id: String,

    /// URL slug, stable across collections (e.g. `"lot-7-denim-jacket"`).
    pub handle: String,

    pub title: String,

    pub price_range: PriceRange,

    #[serde(default)]
    pub featured_image: Option<Image>,

    /// Extra gallery images. Absent on most listings.
    #[serde(default)]
    pub additional_images: Option<Vec<Image>>,

    /// Option groups such as `SIZE` and `COLOR`.
    #[serde(default)]
    pub options: Vec<ProductOption>,

    pub variants: Connection<VariantNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min_variant_price: Money,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    pub currency_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub original_src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantNode {
    #[serde(default)]
    pub quantity_available: Option<i64>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    #[serde(default)]
    pub name: Option<String>,
    pub value: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Amount::deserialize(deserializer)? {
        Amount::Text(s) => s,
        Amount::Number(n) => n.to_string(),
    })
}
