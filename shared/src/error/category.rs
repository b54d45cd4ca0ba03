//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Vendor authorization errors
/// - 4xxx: Sync job errors
/// - 5xxx: Catalog errors
/// - 6xxx: Shipment errors
/// - everything else: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Vendor authorization errors (1xxx)
    Auth,
    /// Sync job errors (4xxx)
    Sync,
    /// Catalog errors (5xxx)
    Catalog,
    /// Shipment errors (6xxx)
    Shipment,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            4000..5000 => Self::Sync,
            5000..6000 => Self::Catalog,
            6000..7000 => Self::Shipment,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Sync => "sync",
            Self::Catalog => "catalog",
            Self::Shipment => "shipment",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(999), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1001), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_code(4002), ErrorCategory::Sync);
        assert_eq!(ErrorCategory::from_code(5001), ErrorCategory::Catalog);
        assert_eq!(ErrorCategory::from_code(6003), ErrorCategory::Shipment);
        assert_eq!(ErrorCategory::from_code(9001), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(10000), ErrorCategory::System);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::NotFound.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::VendorUnauthorized.category(), ErrorCategory::Auth);
        assert_eq!(ErrorCode::SyncAlreadyRunning.category(), ErrorCategory::Sync);
        assert_eq!(ErrorCode::DuplicateUpc.category(), ErrorCategory::Catalog);
        assert_eq!(
            ErrorCode::VendorOrderRejected.category(),
            ErrorCategory::Shipment
        );
        assert_eq!(ErrorCode::DatabaseError.category(), ErrorCategory::System);
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&ErrorCategory::Shipment).unwrap();
        assert_eq!(json, "\"shipment\"");

        let category: ErrorCategory = serde_json::from_str("\"sync\"").unwrap();
        assert_eq!(category, ErrorCategory::Sync);
    }
}
