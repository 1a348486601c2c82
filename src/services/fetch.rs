// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Network fetches for the app shell and map tiles.

use axum::body::Bytes;
use futures_util::future::BoxFuture;
use reqwest::Url;

/// Whether a request loads a new top-level document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    Resource,
}

/// A request to be answered from the network or a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: Url,
    pub mode: RequestMode,
}

impl FetchRequest {
    pub fn navigate(url: Url) -> Self {
        Self {
            url,
            mode: RequestMode::Navigate,
        }
    }

    pub fn resource(url: Url) -> Self {
        Self {
            url,
            mode: RequestMode::Resource,
        }
    }
}

/// A response body with the little metadata the shell needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResponse {
    /// Empty `200` answer used in place of unreachable map tiles.
    pub fn empty() -> Self {
        Self {
            status: 200,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network. HTTP error statuses are responses, not errors; only a
/// failure to get any response at all is a [`FetchError`].
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>>;
}

/// Fetcher backed by a real HTTP client.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            let response = self
                .http
                .get(request.url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            tracing::debug!(url = %request.url, status, "Fetched from network");
            Ok(FetchResponse {
                status,
                content_type,
                body,
            })
        })
    }
}

/// The network could not be reached.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network unavailable: {0}")]
    Network(String),
}
