// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! App shell routes: cached pages, map tiles and partial navigation.

use crate::error::{AppError, Result};
use crate::services::fetch::{FetchRequest, FetchResponse, RequestMode};
use crate::services::navigation::{resolve_fragment, Fragment};
use crate::services::offline_cache::CacheStatus;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fragment", get(get_fragment))
        .route("/api/cache", get(get_cache_state))
        .route("/api/cache/reinstall", post(reinstall_cache))
        .route("/tiles/{z}/{x}/{y}", get(get_tile))
}

/// Classify a request the way the browser would label it.
///
/// `Sec-Fetch-Mode` wins when present; older clients are treated as
/// navigating when they ask for HTML.
pub fn request_mode(headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return if mode.eq_ignore_ascii_case("navigate") {
            RequestMode::Navigate
        } else {
            RequestMode::Resource
        };
    }

    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    if wants_html {
        RequestMode::Navigate
    } else {
        RequestMode::Resource
    }
}

fn into_http(response: FetchResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut http = (status, response.body).into_response();
    if let Some(content_type) = response
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        http.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    http
}

// ─── Shell ───────────────────────────────────────────────────

/// Fallback for every GET not served by the API: answer through the cache.
pub async fn serve_shell(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::NotFound(format!("{} {}", method, uri.path())));
    }

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .trim_start_matches('/');
    let url = state.cache.resolve(path)?;
    // An absolute URL in the path must not turn the shell into a proxy.
    if url.origin() != state.cache.config().scope.origin() {
        tracing::warn!(url = %url, "Rejected shell request outside the shell origin");
        return Err(AppError::NotFound(uri.path().to_string()));
    }
    let request = FetchRequest {
        url,
        mode: request_mode(&headers),
    };

    let response = state.cache.handle(&request).await?;
    Ok(into_http(response))
}

// ─── Tiles ───────────────────────────────────────────────────

async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, String)>,
) -> Result<Response> {
    let y: u32 = y
        .trim_end_matches(".png")
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid tile row: {}", y)))?;

    let url = reqwest::Url::parse(&state.config.tile_url(z, x, y))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad tile URL: {}", e)))?;

    let response = state.cache.handle(&FetchRequest::resource(url)).await?;
    Ok(into_http(response))
}

// ─── Partial navigation ──────────────────────────────────────

#[derive(Deserialize)]
pub struct FragmentQuery {
    pub path: String,
}

async fn get_fragment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FragmentQuery>,
) -> Result<Json<Fragment>> {
    let url = state.cache.resolve(&query.path)?;
    let scope = &state.cache.config().scope;
    if url.origin() != scope.origin() {
        return Err(AppError::BadRequest(format!(
            "{} is outside the app shell",
            query.path
        )));
    }
    let offline_page = state.cache.resolve(&state.config.offline_page)?;

    let fragment = resolve_fragment(state.cache.as_ref(), &url, &offline_page).await?;
    Ok(Json(fragment))
}

// ─── Cache lifecycle ─────────────────────────────────────────

#[derive(Serialize)]
pub struct CacheState {
    pub cache_name: String,
    pub controlling: bool,
    pub caches: Vec<String>,
}

async fn get_cache_state(State(state): State<Arc<AppState>>) -> Json<CacheState> {
    Json(CacheState {
        cache_name: state.cache.config().cache_name.clone(),
        controlling: state.cache.is_controlling(),
        caches: state.cache.storage().keys(),
    })
}

async fn reinstall_cache(State(state): State<Arc<AppState>>) -> Result<Json<CacheStatus>> {
    let status = state.cache.reinstall().await?;
    Ok(Json(status))
}
