//! HTTP surface tests
//!
//! Router-level tests via tower's oneshot: health, scan lifecycle (start /
//! conflict / status / cancel), and the preview proxy's host policy.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use sift_common::events::EventBus;
use sift_common::model::{ScanState, ScanStatus};
use sift_scanner::services::{
    Credentials, ExternalClassifier, InferenceQueue, PreviewProxy, RefreshError, SpotifyClient,
    SymphoniaDecoder, TokenManager, TokenRefresher,
};
use sift_scanner::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn refresh(&self) -> Result<Credentials, RefreshError> {
        Err(RefreshError::Rejected("not expected in this test".into()))
    }
}

fn app(server: &MockServer) -> axum::Router {
    let tokens = Arc::new(TokenManager::new(Arc::new(NoRefresh), "valid".into()));
    let spotify =
        Arc::new(SpotifyClient::with_base_url(tokens, server.uri()).expect("client builds"));
    let state = AppState::new(
        EventBus::new(256),
        spotify,
        None,
        Arc::new(PreviewProxy::new().expect("proxy builds")),
        Arc::new(SymphoniaDecoder::default()),
        Arc::new(InferenceQueue::new(Arc::new(ExternalClassifier::new(
            "sift-scorer-missing".into(),
        )))),
    );
    build_router(state)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid json")
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn playlist_body(artists: &[&str]) -> serde_json::Value {
    let items: Vec<_> = artists
        .iter()
        .enumerate()
        .map(|(i, artist)| {
            serde_json::json!({
                "track": {
                    "id": format!("t{i}"),
                    "name": format!("Song {i}"),
                    "artists": [{ "id": format!("a{i}"), "name": artist }],
                    "album": { "name": "Album" },
                    "duration_ms": 180_000,
                    "preview_url": null,
                    "uri": format!("spotify:track:t{i}"),
                }
            })
        })
        .collect();
    serde_json::json!({ "items": items, "total": artists.len() })
}

#[tokio::test]
async fn health_reports_ok() {
    let server = MockServer::start().await;
    let response = app(&server).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sift-scanner");
}

#[tokio::test]
async fn unknown_scan_status_is_404() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(get(
            "/scan/status/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_unknown_scan_is_404() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scan/cancel/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_requires_playlist_id() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(post_json(
            "/scan/start",
            serde_json::json!({ "playlist_id": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scan_flow_start_poll_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/p1/tracks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(playlist_body(&["The Velvet Sundown", "Radiohead"])),
        )
        .mount(&server)
        .await;

    let app = app(&server);

    let response = app
        .clone()
        .oneshot(post_json(
            "/scan/start",
            serde_json::json!({
                "playlist_id": "p1",
                "options": { "enable_audio_analysis": false },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = json_body(response).await;
    let scan_id = started["scan_id"].as_str().expect("scan id").to_string();

    // Poll until the background scan reaches a terminal state
    let mut snapshot: Option<ScanState> = None;
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(get(&format!("/scan/status/{scan_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let state: ScanState = serde_json::from_value(json_body(response).await).unwrap();
        if state.is_terminal() {
            snapshot = Some(state);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let state = snapshot.expect("scan reached a terminal state");
    assert_eq!(state.status, ScanStatus::Complete);
    assert_eq!(state.results.len(), 2);
    assert_eq!(state.progress.flagged_count, 1);
    assert!(state.results[0].blocklist_match);
    assert!(!state.results[1].blocklist_match);
}

#[tokio::test]
async fn second_start_conflicts_while_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/slow/tracks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(playlist_body(&["Radiohead"]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let app = app(&server);

    let first = app
        .clone()
        .oneshot(post_json(
            "/scan/start",
            serde_json::json!({ "playlist_id": "slow" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let scan_id = json_body(first).await["scan_id"]
        .as_str()
        .unwrap()
        .to_string();

    let second = app
        .clone()
        .oneshot(post_json(
            "/scan/start",
            serde_json::json!({ "playlist_id": "other" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let cancel = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/scan/cancel/{scan_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);
}

#[tokio::test]
async fn preview_proxy_rejects_unlisted_host() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(get(
            "/proxy/preview?url=https%3A%2F%2Fexample.com%2Fclip.mp3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn remove_tracks_requires_uris() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(post_json(
            "/scan/remove-tracks",
            serde_json::json!({ "playlist_id": "p1", "uris": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
