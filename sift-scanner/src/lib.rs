//! sift-scanner library interface
//!
//! Exposes the scan pipeline and HTTP surface for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult, ScanError, TrackError};

use axum::Router;
use chrono::{DateTime, Utc};
use sift_common::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::services::scanner::SharedScanState;
use crate::services::{AudioDecoder, DeezerClient, InferenceQueue, PreviewProxy, SpotifyClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting and scan progress
    pub event_bus: EventBus,
    /// Rate-limited provider client
    pub spotify: Arc<SpotifyClient>,
    /// Fallback preview lookup; `None` disables the fallback globally
    pub deezer: Option<Arc<DeezerClient>>,
    /// Host-allowlisted preview fetcher
    pub proxy: Arc<PreviewProxy>,
    /// Preview byte decoder
    pub decoder: Arc<dyn AudioDecoder>,
    /// Serialized classifier queue
    pub inference: Arc<InferenceQueue>,
    /// Scan sessions by id; snapshots served by the status endpoint
    pub scans: Arc<RwLock<HashMap<Uuid, SharedScanState>>>,
    /// Cancellation tokens for active scan sessions
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        event_bus: EventBus,
        spotify: Arc<SpotifyClient>,
        deezer: Option<Arc<DeezerClient>>,
        proxy: Arc<PreviewProxy>,
        decoder: Arc<dyn AudioDecoder>,
        inference: Arc<InferenceQueue>,
    ) -> Self {
        Self {
            event_bus,
            spotify,
            deezer,
            proxy,
            decoder,
            inference,
            scans: Arc::new(RwLock::new(HashMap::new())),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::scan_routes())
        .merge(api::health_routes())
        .merge(api::preview_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
