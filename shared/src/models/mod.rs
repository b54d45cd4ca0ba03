//! Data models
//!
//! Shared between the sync engine, its storage layer and the operator API.
//! Record IDs are `i64` values allocated by the store on insert; all
//! timestamps are Unix millis.

pub mod asn;
pub mod order;
pub mod product;
pub mod sync_state;
pub mod vendor;

// Re-exports
pub use asn::*;
pub use order::*;
pub use product::*;
pub use sync_state::*;
pub use vendor::*;
