//! Deterministic quality score used to arbitrate conflicting product data

use shared::models::{CanonicalProduct, NormalizedItem};

/// Weight of one populated attribute relative to one point of vendor trust
pub const FIELD_WEIGHT: u32 = 10;

/// Populated descriptive and pricing attributes of a stored product
pub fn product_completeness(product: &CanonicalProduct) -> u32 {
    [
        has_text(&product.name),
        has_text(&product.brand),
        has_text(&product.model),
        has_text(&product.part_number),
        has_text(&product.category),
        product.cost.is_some(),
        product.msrp.is_some(),
        product.map_price.is_some(),
    ]
    .into_iter()
    .filter(|populated| *populated)
    .count() as u32
}

/// Populated descriptive and pricing attributes of an incoming item
pub fn item_completeness(item: &NormalizedItem) -> u32 {
    [
        has_text(&item.name),
        has_text(&item.brand),
        has_text(&item.model),
        has_text(&item.part_number),
        has_text(&item.category),
        item.cost.is_some(),
        item.msrp.is_some(),
        item.map_price.is_some(),
    ]
    .into_iter()
    .filter(|populated| *populated)
    .count() as u32
}

/// Stored records are scored with the trust they were written with
pub fn stored_score(product: &CanonicalProduct) -> u32 {
    product_completeness(product) * FIELD_WEIGHT + u32::from(product.source_trust)
}

pub fn incoming_score(item: &NormalizedItem, trust_weight: u8) -> u32 {
    item_completeness(item) * FIELD_WEIGHT + u32::from(trust_weight)
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
