//! Extraction from raw page-data nodes to [`ttsdb_core::ProductSnapshot`].
//!
//! Extraction is pure: no I/O and no persistence. Calling it twice on the same
//! node yields equal snapshots, which is what lets the aggregator and the
//! history store treat it as a plain function.

use std::collections::HashSet;

use ttsdb_core::{ProductSnapshot, SizeStock};

use crate::types::{ProductNode, VariantNode};

/// Storefront page for a product handle.
#[must_use]
pub fn product_url(base_url: &str, handle: &str) -> String {
    format!("{}/products/{handle}/", base_url.trim_end_matches('/'))
}

/// Normalizes a raw [`ProductNode`] into a [`ProductSnapshot`].
///
/// Sizes come from every option group named "size" (any case), in declared
/// order. A size's quantity is the `quantityAvailable` of the first variant
/// whose first selected option equals the size label, or zero when no variant
/// matches. Repeated labels keep their first occurrence.
#[must_use]
pub fn extract_product(node: &ProductNode, base_url: &str) -> ProductSnapshot {
    let mut seen = HashSet::new();
    let sizes = node
        .options
        .iter()
        .filter(|option| option.name.eq_ignore_ascii_case("size"))
        .flat_map(|option| option.values.iter())
        .filter(|size| seen.insert(size.as_str()))
        .map(|size| SizeStock {
            size: size.clone(),
            quantity: quantity_for_size(&node.variants.edges, size),
        })
        .collect();

    let color = node
        .options
        .iter()
        .find(|option| option.name.eq_ignore_ascii_case("color"))
        .and_then(|option| option.values.first())
        .cloned()
        .unwrap_or_default();

    let image_url = node.featured_image.as_ref().map(|i| i.original_src.clone());
    let gallery = image_url
        .iter()
        .cloned()
        .chain(
            node.additional_images
                .iter()
                .flatten()
                .map(|i| i.original_src.clone()),
        )
        .collect();

    let price = &node.price_range.min_variant_price;

    ProductSnapshot {
        product_id: node.handle.clone(),
        source_id: node.id.clone(),
        title: node.title.clone(),
        price: price.amount.clone(),
        currency_code: price.currency_code.clone(),
        image_url,
        gallery,
        color,
        url: product_url(base_url, &node.handle),
        sizes,
    }
}

/// Title with the color appended in parentheses, as the grid views label
/// colorways of the same garment.
#[must_use]
pub fn display_title(snapshot: &ProductSnapshot) -> String {
    if snapshot.color.is_empty() {
        snapshot.title.clone()
    } else {
        format!("{} ({})", snapshot.title, snapshot.color)
    }
}

fn quantity_for_size(variants: &[crate::types::Edge<VariantNode>], size: &str) -> i32 {
    variants
        .iter()
        .map(|edge| &edge.node)
        .find(|variant| {
            variant
                .selected_options
                .first()
                .is_some_and(|option| option.value == size)
        })
        .and_then(|variant| variant.quantity_available)
        .map_or(0, |qty| i32::try_from(qty.max(0)).unwrap_or(i32::MAX))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
