//! Deezer preview lookup client
//!
//! Fallback source for 30-second preview clips when the provider carries no
//! native preview. Lookup by ISRC gives exact cross-platform matches; the
//! free-text search is a weaker second attempt. The API is unauthenticated.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEEZER_BASE_URL: &str = "https://api.deezer.com";
const USER_AGENT: &str = "sift/0.1.0";

/// Deezer client errors
#[derive(Debug, Error)]
pub enum DeezerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}")]
    Api(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct DeezerTrack {
    preview: Option<String>,
    /// Deezer reports lookup misses as an error object with a 200 status
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchTrack {
    preview: Option<String>,
}

/// Unauthenticated fallback preview lookup client
pub struct DeezerClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeezerClient {
    pub fn new() -> Result<Self, DeezerError> {
        Self::with_base_url(DEEZER_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, DeezerError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        Ok(DeezerClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exact lookup by ISRC. Returns the preview URL when one exists.
    pub async fn lookup_by_isrc(&self, isrc: &str) -> Result<Option<String>, DeezerError> {
        let url = format!("{}/2.0/track/isrc:{}", self.base_url, isrc);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeezerError::Api(status.as_u16()));
        }

        let track: DeezerTrack = response
            .json()
            .await
            .map_err(|e| DeezerError::Parse(e.to_string()))?;

        if track.error.is_some() {
            return Ok(None);
        }
        Ok(track.preview.filter(|p| !p.is_empty()))
    }

    /// Free-text search by title + artist; takes the first hit.
    pub async fn lookup_by_search(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<String>, DeezerError> {
        let query = format!("track:\"{title}\" artist:\"{artist}\"");
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", query.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| DeezerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeezerError::Api(status.as_u16()));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| DeezerError::Parse(e.to_string()))?;

        Ok(results
            .data
            .into_iter()
            .next()
            .and_then(|t| t.preview)
            .filter(|p| !p.is_empty()))
    }

    /// ISRC first, then free-text. Lookup failures are logged and treated as
    /// "no preview" so one flaky lookup never fails a track.
    pub async fn find_preview(
        &self,
        isrc: Option<&str>,
        title: &str,
        artist: &str,
    ) -> Option<String> {
        if let Some(code) = isrc {
            match self.lookup_by_isrc(code).await {
                Ok(Some(url)) => return Some(url),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(isrc = %code, error = %err, "ISRC lookup failed");
                }
            }
        }

        match self.lookup_by_search(title, artist).await {
            Ok(preview) => preview,
            Err(err) => {
                tracing::warn!(title = %title, artist = %artist, error = %err, "Search lookup failed");
                None
            }
        }
    }
}
