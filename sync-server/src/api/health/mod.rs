//! Health check
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /health | GET | liveness plus request gate load |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    vendors: usize,
    gate: GateLoad,
}

#[derive(Debug, Serialize)]
pub struct GateLoad {
    max_concurrent: usize,
    in_flight: usize,
    waiting: usize,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        vendors: state.registry.len(),
        gate: GateLoad {
            max_concurrent: state.gate.max_concurrent(),
            in_flight: state.gate.in_flight(),
            waiting: state.gate.waiting(),
        },
    })
}
