//! Audio preview proxy
//!
//! Every fetchable preview URL is dereferenced through this proxy, which
//! validates the target host against an explicit allowlist of known
//! audio-CDN hostnames before forwarding. The resolver can therefore never
//! be used to fetch arbitrary URLs.

use std::time::Duration;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = "sift/0.1.0";

/// Hosts the provider serves native previews from
const ALLOWED_HOSTS: &[&str] = &[
    "p.scdn.co",
    "audio-ak-spotify-com.akamaized.net",
    "audio-akp-spotify-com.akamaized.net",
    "preview.spotifycdn.com",
];

/// Proxy errors, mapped to 400/403/502 on the HTTP surface
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Host not on the audio-CDN allowlist: {0}")]
    ForbiddenHost(String),

    #[error("Upstream fetch failed: HTTP {0}")]
    Upstream(u16),

    #[error("Network error: {0}")]
    Network(String),
}

/// Host-validating preview fetcher
pub struct PreviewProxy {
    http: reqwest::Client,
    allowed_hosts: Vec<String>,
}

impl PreviewProxy {
    pub fn new() -> Result<Self, ProxyError> {
        Self::with_allowed_hosts(ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect())
    }

    /// Build with an explicit exact-host allowlist (the Deezer preview-CDN
    /// pattern is always accepted in addition).
    pub fn with_allowed_hosts(allowed_hosts: Vec<String>) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProxyError::Network(e.to_string()))?;

        Ok(PreviewProxy {
            http,
            allowed_hosts,
        })
    }

    /// Whether a URL points at a known audio CDN.
    ///
    /// Exact allowlisted hosts, plus the Deezer preview CDN pattern
    /// `cdns-preview-*.dzcdn.net` / `cdn-preview-*.dzcdn.net`.
    pub fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        if self.allowed_hosts.iter().any(|allowed| allowed == host) {
            return true;
        }

        host.ends_with(".dzcdn.net")
            && (host.starts_with("cdns-preview-") || host.starts_with("cdn-preview-"))
    }

    /// Fetch preview bytes from an allowlisted host.
    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>, ProxyError> {
        let url = Url::parse(raw_url).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;

        if !self.is_allowed(&url) {
            return Err(ProxyError::ForbiddenHost(
                url.host_str().unwrap_or("<no host>").to_string(),
            ));
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProxyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Network(e.to_string()))?;

        tracing::debug!(bytes = bytes.len(), "Fetched preview audio");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(url: &str) -> bool {
        PreviewProxy::new()
            .unwrap()
            .is_allowed(&Url::parse(url).unwrap())
    }

    #[test]
    fn provider_cdn_hosts_are_allowed() {
        assert!(allowed("https://p.scdn.co/mp3-preview/abc"));
        assert!(allowed("https://preview.spotifycdn.com/clip.mp3"));
        assert!(allowed(
            "https://audio-ak-spotify-com.akamaized.net/preview.mp3"
        ));
    }

    #[test]
    fn deezer_preview_cdn_pattern_is_allowed() {
        assert!(allowed("https://cdns-preview-7.dzcdn.net/stream/x.mp3"));
        assert!(allowed("https://cdn-preview-2.dzcdn.net/stream/y.mp3"));
    }

    #[test]
    fn other_hosts_are_rejected() {
        assert!(!allowed("https://example.com/preview.mp3"));
        assert!(!allowed("https://evil.dzcdn.net/stream.mp3"));
        assert!(!allowed("https://cdns-preview-7.dzcdn.net.evil.com/x.mp3"));
        assert!(!allowed("https://scdn.co/mp3-preview/abc"));
    }

    #[tokio::test]
    async fn fetch_rejects_disallowed_host_without_network() {
        let proxy = PreviewProxy::new().unwrap();
        let err = proxy
            .fetch("https://example.com/preview.mp3")
            .await
            .expect_err("forbidden");
        assert!(matches!(err, ProxyError::ForbiddenHost(_)));
    }

    #[tokio::test]
    async fn fetch_rejects_garbage_url() {
        let proxy = PreviewProxy::new().unwrap();
        let err = proxy.fetch("not a url").await.expect_err("invalid");
        assert!(matches!(err, ProxyError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn fetch_from_allowlisted_test_host() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let proxy = PreviewProxy::with_allowed_hosts(vec!["127.0.0.1".into()]).unwrap();
        let bytes = proxy
            .fetch(&format!("{}/clip.mp3", server.uri()))
            .await
            .expect("fetch ok");
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_status() {
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let proxy = PreviewProxy::with_allowed_hosts(vec!["127.0.0.1".into()]).unwrap();
        let err = proxy
            .fetch(&format!("{}/gone.mp3", server.uri()))
            .await
            .expect_err("upstream error");
        assert!(matches!(err, ProxyError::Upstream(404)));
    }
}
