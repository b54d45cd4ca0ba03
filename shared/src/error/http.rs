//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound
            | Self::VendorNotFound
            | Self::ProductNotFound
            | Self::AsnNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::SyncAlreadyRunning
            | Self::SyncInvalidTransition
            | Self::DuplicateUpc
            | Self::AsnNumberExists => StatusCode::CONFLICT,

            Self::AsnLineMismatch | Self::MappingOrphaned => StatusCode::UNPROCESSABLE_ENTITY,

            // Upstream vendor failures are not the caller's fault
            Self::VendorUnauthorized
            | Self::FeedFetchFailed
            | Self::FeedMalformed
            | Self::VendorOrderRejected
            | Self::VendorOrderUnauthorized
            | Self::NetworkError => StatusCode::BAD_GATEWAY,

            Self::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
            Self::RequestCancelled => StatusCode::SERVICE_UNAVAILABLE,

            Self::Unknown
            | Self::SyncInterrupted
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::StorageFull
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,

            _ => StatusCode::BAD_REQUEST,
        }
    }
}
