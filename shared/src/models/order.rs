//! Purchase orders and the vendor's order-submission response

use serde::{Deserialize, Serialize};

use super::vendor::VendorId;

/// Order placed with a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: i64,
    pub vendor_id: VendorId,
    /// Our own reference sent to the vendor
    pub po_number: String,
    pub created_at: i64,
}

/// One line of a purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    /// Vendor SKU ordered, used as the join key when the response echoes it
    pub vendor_sku: Option<String>,
    pub upc: Option<String>,
    pub quantity: u32,
}

/// Structured response of a vendor order submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorOrderResponse {
    pub success: bool,
    pub authorized: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Vendor-side order reference numbers
    #[serde(default)]
    pub order_numbers: Vec<String>,
    #[serde(default)]
    pub lines: Vec<VendorOrderLine>,
}

/// Per-line result of a vendor order submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorOrderLine {
    /// Echoed vendor SKU, when the vendor provides one
    #[serde(default)]
    pub vendor_sku: Option<String>,
    pub requested: u32,
    pub fulfilled: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub allocated: bool,
}
