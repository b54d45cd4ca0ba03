//! Unified error codes
//!
//! Every error surfaced by the sync engine or the operator API carries one of
//! these codes. Codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Vendor authorization errors
//! - 4xxx: Sync job errors
//! - 5xxx: Catalog errors
//! - 6xxx: Shipment (ASN) errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Vendor authorization ====================
    /// Vendor rejected our credentials
    VendorUnauthorized = 1001,

    // ==================== 4xxx: Sync ====================
    /// Vendor is not registered
    VendorNotFound = 4001,
    /// A sync job for this vendor is already running
    SyncAlreadyRunning = 4002,
    /// Requested state change is not allowed from the current state
    SyncInvalidTransition = 4003,
    /// Vendor feed could not be fetched
    FeedFetchFailed = 4004,
    /// Vendor feed returned data that could not be decoded
    FeedMalformed = 4005,
    /// Sync job was interrupted by a process restart
    SyncInterrupted = 4006,
    /// Queued outbound request was cancelled before it started
    RequestCancelled = 4007,

    // ==================== 5xxx: Catalog ====================
    /// Canonical product not found
    ProductNotFound = 5001,
    /// UPC is missing or malformed
    InvalidUpc = 5002,
    /// Price field is invalid
    ProductInvalidPrice = 5003,
    /// UPC already belongs to another product
    DuplicateUpc = 5004,
    /// Mapping references a product that does not exist
    MappingOrphaned = 5005,

    // ==================== 6xxx: Shipment ====================
    /// Vendor reported the order submission as failed
    VendorOrderRejected = 6001,
    /// Vendor reported the order submission as unauthorized
    VendorOrderUnauthorized = 6002,
    /// Response line could not be matched to an order line
    AsnLineMismatch = 6003,
    /// ASN number already recorded
    AsnNumberExists = 6004,
    /// ASN not found
    AsnNotFound = 6005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Vendor authorization
            ErrorCode::VendorUnauthorized => "Vendor rejected the configured credentials",

            // Sync
            ErrorCode::VendorNotFound => "Vendor is not registered",
            ErrorCode::SyncAlreadyRunning => "A sync job is already running for this vendor",
            ErrorCode::SyncInvalidTransition => "Sync state transition is not allowed",
            ErrorCode::FeedFetchFailed => "Vendor feed could not be fetched",
            ErrorCode::FeedMalformed => "Vendor feed returned malformed data",
            ErrorCode::SyncInterrupted => "Sync job was interrupted by a restart",
            ErrorCode::RequestCancelled => "Queued request was cancelled",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::InvalidUpc => "UPC is missing or malformed",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::DuplicateUpc => "UPC already exists",
            ErrorCode::MappingOrphaned => "Mapping references a missing product",

            // Shipment
            ErrorCode::VendorOrderRejected => "Vendor rejected the order",
            ErrorCode::VendorOrderUnauthorized => "Vendor refused the order as unauthorized",
            ErrorCode::AsnLineMismatch => "Vendor response line does not match the order",
            ErrorCode::AsnNumberExists => "ASN number already exists",
            ErrorCode::AsnNotFound => "ASN not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",

            // Storage
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Vendor authorization
            1001 => Ok(ErrorCode::VendorUnauthorized),

            // Sync
            4001 => Ok(ErrorCode::VendorNotFound),
            4002 => Ok(ErrorCode::SyncAlreadyRunning),
            4003 => Ok(ErrorCode::SyncInvalidTransition),
            4004 => Ok(ErrorCode::FeedFetchFailed),
            4005 => Ok(ErrorCode::FeedMalformed),
            4006 => Ok(ErrorCode::SyncInterrupted),
            4007 => Ok(ErrorCode::RequestCancelled),

            // Catalog
            5001 => Ok(ErrorCode::ProductNotFound),
            5002 => Ok(ErrorCode::InvalidUpc),
            5003 => Ok(ErrorCode::ProductInvalidPrice),
            5004 => Ok(ErrorCode::DuplicateUpc),
            5005 => Ok(ErrorCode::MappingOrphaned),

            // Shipment
            6001 => Ok(ErrorCode::VendorOrderRejected),
            6002 => Ok(ErrorCode::VendorOrderUnauthorized),
            6003 => Ok(ErrorCode::AsnLineMismatch),
            6004 => Ok(ErrorCode::AsnNumberExists),
            6005 => Ok(ErrorCode::AsnNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            // Storage
            9401 => Ok(ErrorCode::StorageFull),
            9403 => Ok(ErrorCode::StorageCorrupted),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::VendorUnauthorized.code(), 1001);
        assert_eq!(ErrorCode::SyncAlreadyRunning.code(), 4002);
        assert_eq!(ErrorCode::InvalidUpc.code(), 5002);
        assert_eq!(ErrorCode::VendorOrderRejected.code(), 6001);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_u16() {
        assert_eq!(ErrorCode::try_from(4002), Ok(ErrorCode::SyncAlreadyRunning));
        assert_eq!(ErrorCode::try_from(5004), Ok(ErrorCode::DuplicateUpc));
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::SyncInterrupted).unwrap();
        assert_eq!(json, "4006");

        let code: ErrorCode = serde_json::from_str("6003").unwrap();
        assert_eq!(code, ErrorCode::AsnLineMismatch);

        assert!(serde_json::from_str::<ErrorCode>("1234").is_err());
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::NotFound.is_success());
    }
}
