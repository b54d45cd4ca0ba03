//! Shared types for the vendor sync engine
//!
//! Domain models, error codes and response structures used by the engine,
//! its storage layer and the operator API.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{SyncStatus, SyncStrategy, VendorId};
