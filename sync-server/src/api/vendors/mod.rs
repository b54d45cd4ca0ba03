//! Vendor sync API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/vendors/sync | GET | state of every registered vendor |
//! | /api/vendors/{id}/sync | GET | state of one vendor |
//! | /api/vendors/{id}/sync | POST | start a job, `{"strategy": "full"}` (202) |
//! | /api/vendors/{id}/sync/clear-error | POST | acknowledge a failed job |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/vendors", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/sync", get(handler::list_status))
        .route("/{id}/sync", get(handler::get_status).post(handler::start_sync))
        .route("/{id}/sync/clear-error", post(handler::clear_error))
}

#[cfg(test)]
mod tests;
