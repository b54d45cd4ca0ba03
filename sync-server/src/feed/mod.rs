//! Vendor feed boundary
//!
//! A [`FeedNormalizer`] turns one vendor's catalog into pages of
//! [`NormalizedItem`]s. The engine never sees vendor wire formats; adapters
//! own parsing, credentials and request deadlines.

mod http;
mod registry;

pub use self::http::{FeedSetupError, HttpJsonFeed};
pub use registry::{FeedConfig, RegistryError, VendorConfig, VendorEntry, VendorRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::NormalizedItem;
use thiserror::Error;

use crate::gate::GateCancelled;

/// Watermark passed to the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRequest {
    /// Only items changed after this instant (Unix millis); `None` pulls everything
    pub since: Option<i64>,
    /// Opaque vendor delta cursor from the last successful run
    pub cursor: Option<String>,
}

impl FeedRequest {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.since.is_none() && self.cursor.is_none()
    }
}

/// One page of a feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<NormalizedItem>,
    /// Next page number; `None` ends the feed
    #[serde(default)]
    pub next_page: Option<u32>,
    /// Fresh delta cursor, usually only on the last page
    #[serde(default)]
    pub delta_cursor: Option<String>,
}

/// Feed fetch errors, all fatal for the running job
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network failure, timeout or vendor-side 5xx
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// Credentials rejected by the vendor
    #[error("vendor rejected credentials: {0}")]
    Authorization(String),

    /// Response could not be decoded
    #[error("malformed feed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Cancelled(#[from] GateCancelled),
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        let code = match &err {
            FeedError::Transient(_) => ErrorCode::FeedFetchFailed,
            FeedError::Authorization(_) => ErrorCode::VendorUnauthorized,
            FeedError::Malformed(_) => ErrorCode::FeedMalformed,
            FeedError::Cancelled(_) => ErrorCode::RequestCancelled,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Vendor-specific adapter producing normalized catalog pages
///
/// Pages are numbered from 1. The feed is finite: the last page returns
/// `next_page: None`.
#[async_trait]
pub trait FeedNormalizer: Send + Sync {
    async fn fetch_page(&self, request: &FeedRequest, page: u32) -> Result<FeedPage, FeedError>;
}
