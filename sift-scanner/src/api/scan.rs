//! Scan lifecycle API handlers
//!
//! POST /scan/start, GET /scan/status/{id}, POST /scan/cancel/{id},
//! POST /scan/remove-tracks

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_common::model::{ScanOptions, ScanState, ScanStatus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, ScanError};
use crate::services::ScanOrchestrator;
use crate::AppState;

/// POST /scan/start request
#[derive(Debug, Deserialize)]
pub struct StartScanRequest {
    pub playlist_id: String,
    #[serde(default)]
    pub options: ScanOptions,
}

/// POST /scan/start response
#[derive(Debug, Serialize)]
pub struct StartScanResponse {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
}

/// POST /scan/remove-tracks request
#[derive(Debug, Deserialize)]
pub struct RemoveTracksRequest {
    pub playlist_id: String,
    pub uris: Vec<String>,
}

/// POST /scan/remove-tracks response
#[derive(Debug, Serialize)]
pub struct RemoveTracksResponse {
    pub removed: usize,
}

/// POST /scan/start
///
/// Begin a scan session. Returns 202 Accepted with the scan id; progress is
/// streamed over /events and polled via /scan/status. One scan runs at a
/// time, which also guarantees exclusive ownership of the capture device.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<StartScanRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.playlist_id.trim().is_empty() {
        return Err(ApiError::BadRequest("playlist_id is required".to_string()));
    }

    {
        let scans = state.scans.read().await;
        for scan in scans.values() {
            if !scan.read().await.is_terminal() {
                return Err(ApiError::Conflict("Scan already running".to_string()));
            }
        }
    }

    let scan_id = Uuid::new_v4();
    let scan_state = Arc::new(RwLock::new(ScanState::new(
        scan_id,
        request.playlist_id.clone(),
    )));
    let cancel = CancellationToken::new();

    state.scans.write().await.insert(scan_id, scan_state.clone());
    state
        .cancellation_tokens
        .write()
        .await
        .insert(scan_id, cancel.clone());

    let response = {
        let st = scan_state.read().await;
        StartScanResponse {
            scan_id,
            status: st.status,
            started_at: st.started_at,
        }
    };

    tracing::info!(
        scan_id = %scan_id,
        playlist_id = %request.playlist_id,
        "Scan session started"
    );

    let orchestrator = ScanOrchestrator::new(
        state.spotify.clone(),
        state.deezer.clone(),
        state.proxy.clone(),
        state.decoder.clone(),
        state.inference.clone(),
        None,
        state.event_bus.clone(),
        request.options,
    );
    tokio::spawn(async move {
        orchestrator.run(scan_state, cancel).await;
        tracing::info!(scan_id = %scan_id, "Scan background task finished");
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /scan/status/{scan_id}
pub async fn get_scan_status(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<ScanState>> {
    let scans = state.scans.read().await;
    let scan = scans
        .get(&scan_id)
        .ok_or_else(|| ApiError::NotFound(format!("Scan not found: {scan_id}")))?;

    let snapshot = scan.read().await.clone();
    Ok(Json(snapshot))
}

/// POST /scan/cancel/{scan_id}
///
/// Cooperative cancellation: the currently-processing track finishes, no
/// further tracks are scheduled, already-emitted results stay.
pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<ScanState>> {
    let token = {
        let tokens = state.cancellation_tokens.read().await;
        tokens
            .get(&scan_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Scan not found: {scan_id}")))?
    };

    token.cancel();
    tracing::info!(scan_id = %scan_id, "Scan cancellation requested");

    let scans = state.scans.read().await;
    let scan = scans
        .get(&scan_id)
        .ok_or_else(|| ApiError::NotFound(format!("Scan not found: {scan_id}")))?;
    let snapshot = scan.read().await.clone();
    Ok(Json(snapshot))
}

/// POST /scan/remove-tracks
///
/// Remove tracks the consumer selected from its result set.
pub async fn remove_tracks(
    State(state): State<AppState>,
    Json(request): Json<RemoveTracksRequest>,
) -> ApiResult<Json<RemoveTracksResponse>> {
    if request.uris.is_empty() {
        return Err(ApiError::BadRequest("uris must not be empty".to_string()));
    }

    state
        .spotify
        .remove_tracks(&request.playlist_id, &request.uris)
        .await
        .map_err(|err| match err {
            ScanError::AuthExpired => ApiError::Unauthorized(err.to_string()),
            ScanError::RateLimited { .. } => ApiError::TooManyRequests(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok(Json(RemoveTracksResponse {
        removed: request.uris.len(),
    }))
}

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/start", post(start_scan))
        .route("/scan/status/:scan_id", get(get_scan_status))
        .route("/scan/cancel/:scan_id", post(cancel_scan))
        .route("/scan/remove-tracks", post(remove_tracks))
}
