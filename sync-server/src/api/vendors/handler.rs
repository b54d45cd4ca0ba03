//! Vendor sync handlers

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::models::{SyncStrategy, VendorId, VendorSyncState};

use crate::audit_log;
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct StartSyncRequest {
    /// `full` when omitted
    #[serde(default)]
    pub strategy: Option<String>,
}

/// GET /api/vendors/sync
pub async fn list_status(
    State(state): State<ServerState>,
) -> AppResult<Json<Vec<VendorSyncState>>> {
    let states = state.orchestrator.list_status().await?;
    Ok(Json(states))
}

/// GET /api/vendors/{id}/sync
pub async fn get_status(
    State(state): State<ServerState>,
    Path(id): Path<VendorId>,
) -> AppResult<Json<VendorSyncState>> {
    let sync_state = state.orchestrator.status(&id).await?;
    Ok(Json(sync_state))
}

/// POST /api/vendors/{id}/sync
///
/// An empty body means a full sync. Answers once the vendor is claimed;
/// the job itself runs in the background.
pub async fn start_sync(
    State(state): State<ServerState>,
    Path(id): Path<VendorId>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<VendorSyncState>)> {
    let request: StartSyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartSyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::invalid_request(e.to_string()))?
    };
    let strategy = match request.strategy.as_deref() {
        None => SyncStrategy::Full,
        Some(raw) => SyncStrategy::from_str(raw).map_err(AppError::validation)?,
    };

    let claimed = state.orchestrator.start_sync(&id, strategy).await?;

    audit_log!("operator", "sync_started", id.as_str(), strategy.as_str());
    Ok((StatusCode::ACCEPTED, Json(claimed)))
}

/// POST /api/vendors/{id}/sync/clear-error
pub async fn clear_error(
    State(state): State<ServerState>,
    Path(id): Path<VendorId>,
) -> AppResult<Json<VendorSyncState>> {
    let cleared = state.orchestrator.clear_error(&id).await?;

    audit_log!("operator", "sync_error_cleared", id.as_str());
    Ok(Json(cleared))
}
