//! Advance Shipment Notice models

use serde::{Deserialize, Serialize};
use std::fmt;

use super::vendor::VendorId;

/// Overall fulfilment status of an ASN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsnStatus {
    Complete,
    Partial,
    Cancelled,
}

impl AsnStatus {
    /// Derive the status from shipped vs. requested totals
    pub fn from_totals(shipped: u32, requested: u32) -> Self {
        if shipped == 0 {
            AsnStatus::Cancelled
        } else if shipped < requested {
            AsnStatus::Partial
        } else {
            AsnStatus::Complete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AsnStatus::Complete => "complete",
            AsnStatus::Partial => "partial",
            AsnStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AsnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ASN header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asn {
    pub id: i64,
    pub asn_number: String,
    pub order_id: i64,
    pub vendor_id: VendorId,
    pub status: AsnStatus,
    pub items_shipped: u32,
    pub items_total: u32,
    pub notes: String,
    /// Vendor response kept verbatim for audit
    pub raw_payload: serde_json::Value,
    pub created_at: i64,
}

/// ASN line, one per paired order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsnItem {
    pub id: i64,
    pub asn_id: i64,
    pub order_line_id: i64,
    pub quantity_shipped: u32,
    pub quantity_backordered: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_totals() {
        assert_eq!(AsnStatus::from_totals(0, 5), AsnStatus::Cancelled);
        assert_eq!(AsnStatus::from_totals(0, 0), AsnStatus::Cancelled);
        assert_eq!(AsnStatus::from_totals(3, 5), AsnStatus::Partial);
        assert_eq!(AsnStatus::from_totals(5, 5), AsnStatus::Complete);
    }
}
