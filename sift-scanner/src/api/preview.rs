//! Preview proxy endpoint
//!
//! The consuming UI cannot fetch CDN audio directly (CORS), so previews are
//! proxied here. The underlying fetcher enforces the audio-CDN host
//! allowlist; anything else is a 403.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::services::ProxyError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub url: String,
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidUrl(msg) => ApiError::BadRequest(msg),
            ProxyError::ForbiddenHost(host) => {
                ApiError::Forbidden(format!("URL not from an allowed audio host: {host}"))
            }
            ProxyError::Upstream(status) => {
                ApiError::BadGateway(format!("upstream returned HTTP {status}"))
            }
            ProxyError::Network(msg) => ApiError::BadGateway(msg),
        }
    }
}

/// GET /proxy/preview?url=<encoded>
pub async fn preview_proxy(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.proxy.fetch(&query.url).await.map_err(ApiError::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    ))
}

pub fn preview_routes() -> Router<AppState> {
    Router::new().route("/proxy/preview", get(preview_proxy))
}
