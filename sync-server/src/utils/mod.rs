//! Utilities
//!
//! - [`logger`] - tracing setup and the `audit_log!` macro
//! - error and response types re-exported from `shared`

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
