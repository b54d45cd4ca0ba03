//! Catalog models: vendor feed items, canonical products, vendor mappings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::vendor::VendorId;

/// One item record as produced by a vendor feed adapter
///
/// Adapters translate the vendor wire format into this shape; the engine
/// never sees vendor-specific payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    /// Vendor's own SKU / item id
    pub vendor_sku: String,
    pub upc: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Dealer cost
    #[serde(default)]
    pub cost: Option<Decimal>,
    /// Manufacturer suggested retail price
    #[serde(default)]
    pub msrp: Option<Decimal>,
    /// Minimum advertised price
    #[serde(default)]
    pub map_price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i64>,
    /// Vendor-side modification time (Unix millis), if the feed reports one
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Canonical catalog record, one per UPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub id: i64,
    pub upc: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub part_number: Option<String>,
    pub category: Option<String>,
    pub cost: Option<Decimal>,
    pub msrp: Option<Decimal>,
    pub map_price: Option<Decimal>,
    /// Vendor whose data last won the merge
    pub source_vendor: VendorId,
    /// Trust weight of `source_vendor` at the time it wrote this record
    pub source_trust: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Link between a vendor item and its canonical product
///
/// Keyed by `(vendor_id, product_id)`; refreshed on every merge pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProductMapping {
    pub vendor_id: VendorId,
    pub product_id: i64,
    pub vendor_sku: String,
    /// Vendor-local descriptive fields
    pub vendor_name: Option<String>,
    pub vendor_cost: Option<Decimal>,
    pub stock: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl VendorProductMapping {
    /// True when the vendor-local fields match `other` (timestamps ignored)
    pub fn same_content(&self, other: &VendorProductMapping) -> bool {
        self.vendor_id == other.vendor_id
            && self.product_id == other.product_id
            && self.vendor_sku == other.vendor_sku
            && self.vendor_name == other.vendor_name
            && self.vendor_cost == other.vendor_cost
            && self.stock == other.stock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_item_sparse_json() {
        let item: NormalizedItem =
            serde_json::from_str(r#"{"vendor_sku":"A-1","upc":"012345678905","cost":"12.50"}"#)
                .unwrap();
        assert_eq!(item.upc, "012345678905");
        assert_eq!(item.cost, Some(Decimal::new(1250, 2)));
        assert!(item.name.is_none());
        assert!(item.stock.is_none());
    }

    #[test]
    fn test_mapping_same_content_ignores_timestamps() {
        let a = VendorProductMapping {
            vendor_id: VendorId::from("acme"),
            product_id: 7,
            vendor_sku: "A-1".into(),
            vendor_name: Some("Widget".into()),
            vendor_cost: None,
            stock: Some(3),
            created_at: 1,
            updated_at: 1,
        };
        let mut b = a.clone();
        b.updated_at = 99;
        assert!(a.same_content(&b));
        b.stock = Some(4);
        assert!(!a.same_content(&b));
    }
}
