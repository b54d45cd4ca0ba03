//! Operator HTTP API
//!
//! - [`health`] - liveness and gate load
//! - [`vendors`] - sync status, triggers and error acknowledgement

pub mod health;
pub mod vendors;

use axum::{Router, middleware};
use tower_http::cors::CorsLayer;

use crate::core::ServerState;

async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());
    response
}

/// Routes without state
pub fn routes() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(vendors::router())
}

/// Full application with state and middleware
pub fn build_app(state: ServerState) -> Router {
    routes()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
}
