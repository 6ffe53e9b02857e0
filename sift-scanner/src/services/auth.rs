//! Access-token management with coalesced refresh
//!
//! The provider invalidates access tokens roughly hourly; any API call can
//! observe a 401. Concurrent observers must share a single in-flight refresh
//! rather than issuing duplicates, so [`TokenManager::refresh_after_unauthorized`]
//! serializes through a mutex and re-checks whether another caller already
//! replaced the token while it waited.
//!
//! The refresh token itself is owned by the [`TokenRefresher`] collaborator;
//! the manager only consumes the returned access token.

use crate::error::ScanError;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const USER_AGENT: &str = "sift/0.1.0";

/// Refresh failures; all of them surface as `AuthExpired` to API callers
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Credentials returned by a successful refresh
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    /// Present when the provider rotated the refresh token
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Auth collaborator boundary: exchanges a stored refresh token for fresh
/// credentials.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<Credentials, RefreshError>;
}

/// Shared access-token holder with single-flight refresh
pub struct TokenManager {
    refresher: Arc<dyn TokenRefresher>,
    access_token: RwLock<String>,
    refresh_gate: Mutex<()>,
}

impl TokenManager {
    pub fn new(refresher: Arc<dyn TokenRefresher>, initial_token: String) -> Self {
        TokenManager {
            refresher,
            access_token: RwLock::new(initial_token),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The current access token for request authorization.
    pub async fn access_token(&self) -> String {
        self.access_token.read().await.clone()
    }

    /// Refresh after a request observed a 401 with `stale_token`.
    ///
    /// Callers that arrive while a refresh is in flight wait on the gate and
    /// then find the token already replaced, so exactly one network refresh
    /// happens per expiry. Returns the token to retry with; a refresh failure
    /// is `AuthExpired`.
    pub async fn refresh_after_unauthorized(&self, stale_token: &str) -> Result<String, ScanError> {
        let _gate = self.refresh_gate.lock().await;

        {
            let current = self.access_token.read().await;
            if *current != stale_token {
                tracing::debug!("Token already refreshed by a concurrent caller");
                return Ok(current.clone());
            }
        }

        tracing::info!("Access token expired, refreshing");
        let credentials = self.refresher.refresh().await.map_err(|err| {
            tracing::warn!(error = %err, "Token refresh failed");
            ScanError::AuthExpired
        })?;

        let mut current = self.access_token.write().await;
        *current = credentials.access_token.clone();
        Ok(credentials.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Refreshes against the provider's OAuth token endpoint using the
/// client-credentials Basic header. Rotated refresh tokens are stored for
/// subsequent refreshes.
pub struct SpotifyAuthRefresher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: RwLock<String>,
}

impl SpotifyAuthRefresher {
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Result<Self, RefreshError> {
        Self::with_token_url(client_id, client_secret, refresh_token, TOKEN_URL.to_string())
    }

    pub fn with_token_url(
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_url: String,
    ) -> Result<Self, RefreshError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        Ok(SpotifyAuthRefresher {
            http,
            token_url,
            client_id,
            client_secret,
            refresh_token: RwLock::new(refresh_token),
        })
    }

    fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

#[async_trait]
impl TokenRefresher for SpotifyAuthRefresher {
    async fn refresh(&self) -> Result<Credentials, RefreshError> {
        let refresh_token = self.refresh_token.read().await.clone();

        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, self.basic_header())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Network(format!("invalid token response: {e}")))?;

        // Provider may rotate the refresh token; keep the newest
        if let Some(rotated) = &token.refresh_token {
            *self.refresh_token.write().await = rotated.clone();
        }

        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRefresher {
        fn new(fail: bool) -> Self {
            CountingRefresher {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self) -> Result<Credentials, RefreshError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if self.fail {
                return Err(RefreshError::Rejected("invalid_grant".into()));
            }
            Ok(Credentials {
                access_token: format!("token-{call}"),
                refresh_token: None,
                expires_at: Utc::now() + ChronoDuration::hours(1),
            })
        }
    }

    #[tokio::test]
    async fn concurrent_401_observers_share_one_refresh() {
        let refresher = Arc::new(CountingRefresher::new(false));
        let manager = Arc::new(TokenManager::new(refresher.clone(), "stale".into()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.refresh_after_unauthorized("stale").await
            }));
        }

        for handle in handles {
            let token = handle.await.expect("task").expect("refresh succeeds");
            assert_eq!(token, "token-1");
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.access_token().await, "token-1");
    }

    #[tokio::test]
    async fn second_expiry_triggers_second_refresh() {
        let refresher = Arc::new(CountingRefresher::new(false));
        let manager = TokenManager::new(refresher.clone(), "stale".into());

        let first = manager.refresh_after_unauthorized("stale").await.unwrap();
        assert_eq!(first, "token-1");

        let second = manager.refresh_after_unauthorized(&first).await.unwrap();
        assert_eq!(second, "token-2");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_failure_maps_to_auth_expired() {
        let refresher = Arc::new(CountingRefresher::new(true));
        let manager = TokenManager::new(refresher, "stale".into());

        let err = manager
            .refresh_after_unauthorized("stale")
            .await
            .expect_err("refresh fails");
        assert!(matches!(err, ScanError::AuthExpired));
    }
}
