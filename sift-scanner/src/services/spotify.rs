//! Playlist provider API client
//!
//! Authenticated access to the track source with the failure policy the rest
//! of the scan relies on:
//! - 401 → coalesced token refresh, then the original request retried once
//! - 429 → honor `Retry-After` (seconds or HTTP-date) up to a 30 s ceiling,
//!   else exponential backoff, at most [`MAX_ATTEMPTS`] requests total
//! - any other non-2xx → [`ScanError::UpstreamHttp`]
//!
//! Pagination and batched deletes insert small fixed delays between requests
//! as proactive rate-limit avoidance, distinct from the reactive 429 path.

use crate::services::auth::TokenManager;
use crate::error::ScanError;
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sift_common::human_time::format_wait_estimate;
use sift_common::model::{ArtistRef, Track};
use std::sync::Arc;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const USER_AGENT: &str = "sift/0.1.0";

/// Tracks fetched per pagination request
pub const PAGE_LIMIT: usize = 100;
/// Track URIs removed per delete request (provider maximum)
pub const REMOVE_BATCH_SIZE: usize = 100;

/// Delay between pagination requests
const PAGE_DELAY: Duration = Duration::from_millis(150);
/// Delay between batched delete requests
const BATCH_DELAY: Duration = Duration::from_millis(200);

/// Total request attempts for a 429-limited call
const MAX_ATTEMPTS: u32 = 3;
/// Waits beyond this fail immediately instead of hanging the caller
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
/// Backoff base when no Retry-After header is present: 5 × 2^attempt
const BACKOFF_BASE_SECS: u64 = 5;

/// One page of a paginated listing
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Playlist entry; `track` is null for local files and ghost entries
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<WireTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<WireArtist>,
    pub album: Option<WireAlbum>,
    #[serde(default)]
    pub duration_ms: u64,
    pub preview_url: Option<String>,
    pub uri: String,
    pub external_ids: Option<ExternalIds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAlbum {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

impl WireTrack {
    /// Map to the domain track; entries without a catalog id are dropped.
    pub fn into_track(self) -> Option<Track> {
        let id = self.id?;
        Some(Track {
            id,
            name: self.name,
            artists: self
                .artists
                .into_iter()
                .map(|a| ArtistRef {
                    id: a.id.unwrap_or_default(),
                    name: a.name,
                })
                .collect(),
            album: self.album.map(|a| a.name),
            duration_ms: self.duration_ms,
            preview_url: self.preview_url,
            isrc: self.external_ids.and_then(|e| e.isrc),
            uri: self.uri,
        })
    }
}

/// Rate-limited, token-refreshing provider client
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl SpotifyClient {
    pub fn new(tokens: Arc<TokenManager>) -> Result<Self, ScanError> {
        Self::with_base_url(tokens, API_BASE_URL.to_string())
    }

    pub fn with_base_url(tokens: Arc<TokenManager>, base_url: String) -> Result<Self, ScanError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScanError::Network(e.to_string()))?;

        Ok(SpotifyClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Fetch one page of playlist tracks.
    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Page<PlaylistItem>, ScanError> {
        let endpoint = format!(
            "/playlists/{playlist_id}/tracks?limit={limit}&offset={offset}"
        );
        self.request_json(Method::GET, &endpoint, None)
            .await?
            .ok_or_else(|| ScanError::Network("empty playlist response".into()))
    }

    /// Fetch every track of a playlist, driving pagination until a short page
    /// or the reported total is reached. Null playlist entries are skipped.
    pub async fn get_all_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, ScanError> {
        self.get_all_playlist_tracks_with_limit(playlist_id, PAGE_LIMIT)
            .await
    }

    /// Pagination driver with an explicit page size.
    pub async fn get_all_playlist_tracks_with_limit(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ScanError> {
        let mut tracks = Vec::new();
        let mut fetched = 0usize;
        let mut offset = 0usize;

        loop {
            let page = self.get_playlist_tracks(playlist_id, limit, offset).await?;
            let page_len = page.items.len();
            fetched += page_len;

            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter_map(WireTrack::into_track),
            );

            if page_len < limit || fetched >= page.total {
                break;
            }
            offset += limit;

            tokio::time::sleep(PAGE_DELAY).await;
        }

        tracing::info!(
            playlist_id = %playlist_id,
            track_count = tracks.len(),
            "Loaded playlist tracks"
        );

        Ok(tracks)
    }

    /// Remove tracks from a playlist in batches of [`REMOVE_BATCH_SIZE`].
    pub async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ScanError> {
        let endpoint = format!("/playlists/{playlist_id}/tracks");
        let batches: Vec<_> = uris.chunks(REMOVE_BATCH_SIZE).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            let body = json!({
                "tracks": batch.iter().map(|uri| json!({ "uri": uri })).collect::<Vec<_>>(),
            });
            self.request_json::<serde_json::Value>(Method::DELETE, &endpoint, Some(body))
                .await?;

            if index + 1 < batch_count {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        tracing::info!(
            playlist_id = %playlist_id,
            removed = uris.len(),
            "Removed tracks from playlist"
        );

        Ok(())
    }

    /// Issue one authenticated request with the 401/429 policy applied.
    /// Returns `None` for 204 responses.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>, ScanError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut attempt: u32 = 0;

        loop {
            let token = self.tokens.access_token().await;
            let response = self.send(&method, &url, &token, body.as_ref()).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let fresh = self.tokens.refresh_after_unauthorized(&token).await?;
                tracing::debug!(url = %url, "Retrying request with refreshed token");
                let retry = self.send(&method, &url, &fresh, body.as_ref()).await?;
                return Self::read_body(retry).await;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = parse_retry_after(response.headers())
                    .unwrap_or_else(|| backoff_delay(attempt));

                if wait > MAX_RETRY_AFTER {
                    return Err(ScanError::RateLimited {
                        wait_estimate: format_wait_estimate(wait.as_secs()),
                    });
                }

                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(ScanError::RateLimited {
                        wait_estimate: format_wait_estimate(wait.as_secs()),
                    });
                }

                tracing::warn!(
                    url = %url,
                    wait_secs = wait.as_secs(),
                    attempt,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return Self::read_body(response).await;
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ScanError> {
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn read_body<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, ScanError> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ScanError::UpstreamHttp(status.as_u16()));
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ScanError::Network(format!("invalid response body: {e}")))
    }
}

/// Read a Retry-After header as either integer seconds or an HTTP-date
/// (delta from now, floored at zero).
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = (date.with_timezone(&Utc) - Utc::now()).num_seconds().max(0);
    Some(Duration::from_secs(delta as u64))
}

/// Backoff for a 429 without a Retry-After header: 5 × 2^attempt seconds.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(BACKOFF_BASE_SECS << attempt)
}
