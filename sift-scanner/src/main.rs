//! sift-scanner - AI-generated-track playlist scanner service
//!
//! Scans streaming-provider playlists with a two-phase pipeline (artist
//! blocklist, then audio classification over preview clips) and streams
//! incremental results over SSE.

use anyhow::Result;
use sift_common::events::EventBus;
use sift_scanner::config::ScannerConfig;
use sift_scanner::services::{
    DeezerClient, ExternalClassifier, InferenceQueue, PreviewProxy, SpotifyAuthRefresher,
    SpotifyClient, SymphoniaDecoder, TokenManager,
};
use sift_scanner::AppState;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Scorer command used when none is configured
const DEFAULT_CLASSIFIER_CMD: &str = "sift-scorer";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting sift-scanner");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ScannerConfig::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    let refresher = SpotifyAuthRefresher::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.refresh_token.clone(),
    )
    .map_err(|e| anyhow::anyhow!("auth client init failed: {e}"))?;
    let tokens = Arc::new(TokenManager::new(
        Arc::new(refresher),
        config.access_token.clone().unwrap_or_default(),
    ));

    let spotify = Arc::new(
        SpotifyClient::new(tokens).map_err(|e| anyhow::anyhow!("provider client init: {e}"))?,
    );
    let deezer = match DeezerClient::new() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Fallback preview lookup unavailable: {e}");
            None
        }
    };
    let proxy =
        Arc::new(PreviewProxy::new().map_err(|e| anyhow::anyhow!("preview proxy init: {e}"))?);
    let decoder = Arc::new(SymphoniaDecoder::default());

    let classifier_cmd = config
        .classifier_command
        .clone()
        .unwrap_or_else(|| DEFAULT_CLASSIFIER_CMD.to_string());
    let inference = Arc::new(InferenceQueue::new(Arc::new(ExternalClassifier::new(
        classifier_cmd.clone(),
    ))));
    info!(command = %classifier_cmd, "Classifier configured");

    let event_bus = EventBus::new(100);

    let state = AppState::new(event_bus, spotify, deezer, proxy, decoder, inference);
    let app = sift_scanner::build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
