// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use hike_tracker::config::Config;
use hike_tracker::db::LocalStorage;
use hike_tracker::models::{HikeRecord, Position};
use hike_tracker::routes::create_router;
use hike_tracker::services::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};
use hike_tracker::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[allow(dead_code)]
pub const INDEX_HTML: &str =
    "<html><body><nav>menu</nav><main><h1>Track a hike</h1></main></body></html>";
#[allow(dead_code)]
pub const HISTORY_HTML: &str =
    "<html><body><nav>menu</nav><main><h1>History</h1></main></body></html>";
#[allow(dead_code)]
pub const OFFLINE_HTML: &str =
    "<html><body><main><p>You are offline.</p></main></body></html>";
#[allow(dead_code)]
pub const TILE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

/// Static shell origin that can be switched offline.
#[derive(Default)]
pub struct FakeShell {
    offline: AtomicBool,
    fetched: Mutex<Vec<String>>,
}

impl FakeShell {
    #[allow(dead_code)]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every URL requested from the network so far.
    #[allow(dead_code)]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    fn page(path: &str) -> Option<(&'static str, &'static [u8])> {
        match path {
            "/" | "/index.html" => Some(("text/html", INDEX_HTML.as_bytes())),
            "/views/history.html" => Some(("text/html", HISTORY_HTML.as_bytes())),
            "/views/offline.html" => Some(("text/html", OFFLINE_HTML.as_bytes())),
            "/app.js" => Some(("application/javascript", b"console.log('shell');")),
            _ => None,
        }
    }
}

impl Fetcher for FakeShell {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            self.fetched.lock().unwrap().push(request.url.to_string());
            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Network("connection refused".to_string()));
            }
            if request.url.host_str() == Some("tile.openstreetmap.org") {
                return Ok(FetchResponse {
                    status: 200,
                    content_type: Some("image/png".to_string()),
                    body: Bytes::from_static(TILE_PNG),
                });
            }
            Ok(match Self::page(request.url.path()) {
                Some((content_type, body)) => FetchResponse {
                    status: 200,
                    content_type: Some(content_type.to_string()),
                    body: Bytes::from_static(body),
                },
                None => FetchResponse {
                    status: 404,
                    content_type: Some("text/plain".to_string()),
                    body: Bytes::from_static(b"not found"),
                },
            })
        })
    }
}

/// Create a test app backed by in-memory storage and a fake shell origin.
/// Returns the router, the shared state and the shell.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeShell>) {
    create_test_app_with_quota(Config::test_default().storage_quota_bytes)
}

#[allow(dead_code)]
pub fn create_test_app_with_quota(
    quota_bytes: usize,
) -> (axum::Router, Arc<AppState>, Arc<FakeShell>) {
    let config = Config::test_default();
    let storage = LocalStorage::in_memory(quota_bytes);
    let shell = Arc::new(FakeShell::default());
    let state = Arc::new(
        AppState::new(config, storage, shell.clone()).expect("Test config should be valid"),
    );

    (create_router(state.clone()), state, shell)
}

/// Send one request, returning the status and the raw body.
#[allow(dead_code)]
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, body)
}

/// Send one request and decode a JSON body.
#[allow(dead_code)]
pub async fn send_json(
    app: &axum::Router,
    request: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, request).await;
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A saved hike with the given id along a short northward route.
#[allow(dead_code)]
pub fn sample_hike(id: u64, photos: usize) -> HikeRecord {
    HikeRecord {
        id,
        date: "2026-05-01 09:00:00 UTC".to_string(),
        duration_display: "00:10:00".to_string(),
        distance_km: 0.2224,
        positions: vec![
            Position { lat: 0.0, lng: 0.0, alt: None },
            Position { lat: 0.001, lng: 0.0, alt: None },
            Position { lat: 0.002, lng: 0.0, alt: Some(12.0) },
        ],
        photos: (0..photos)
            .map(|i| hike_tracker::models::Photo {
                image_data: "data:image/png;base64,AAAA".to_string(),
                lat: Some(0.001 * i as f64),
                lng: Some(0.0),
                captured_at: "2026-05-01T09:05:00Z".to_string(),
            })
            .collect(),
    }
}
