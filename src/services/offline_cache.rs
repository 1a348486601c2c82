// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline cache manager for the app shell.
//!
//! Request policy (network-first for navigations):
//! - navigation: network, falling back to the precached offline page
//! - map tiles: cache, then network; a network failure yields an empty 200
//! - everything else: cache, then network
//!
//! Lifecycle: `install` fills the current cache generation with the shell
//! manifest (all or nothing), `activate` deletes every other generation and
//! takes control of clients. Until then requests go straight to the network.
//!
//! Navigation outcomes double as the connectivity signal: the first
//! navigation that falls back to the offline page raises an error toast,
//! and the next one the network answers raises an info toast.

use dashmap::DashMap;
use futures_util::future::{try_join_all, BoxFuture};
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::services::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, RequestMode};
use crate::services::view::{Toast, ViewModel};

/// Shell assets precached on install.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "index.html",
    "styles.css",
    "app.js",
    "manifest.json",
    "views/native.html",
    "views/offline.html",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
];

pub const DEFAULT_CACHE_NAME: &str = "hike-tracker-cache-v3";
pub const DEFAULT_OFFLINE_PAGE: &str = "views/offline.html";

pub const OFFLINE_MESSAGE: &str = "No network connection, working offline";
pub const ONLINE_MESSAGE: &str = "Network connection restored";

/// Static configuration of the cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name of the current cache generation
    pub cache_name: String,
    /// Origin the shell is served from; relative entries resolve against it
    pub scope: Url,
    pub precache: Vec<String>,
    /// Must also appear in `precache`
    pub offline_page: String,
    /// Hosts whose requests are map tiles
    pub tile_hosts: Vec<String>,
}

type Cache = DashMap<String, FetchResponse>;

/// Named cache generations, searched in creation order.
#[derive(Default)]
pub struct CacheStorage {
    generations: RwLock<Vec<(String, Arc<Cache>)>>,
}

impl CacheStorage {
    /// Open a generation, creating it if needed.
    pub fn open(&self, name: &str) -> Arc<Cache> {
        let mut generations = write(&self.generations);
        if let Some((_, cache)) = generations.iter().find(|(n, _)| n == name) {
            return Arc::clone(cache);
        }
        let cache = Arc::new(Cache::new());
        generations.push((name.to_string(), Arc::clone(&cache)));
        cache
    }

    pub fn keys(&self) -> Vec<String> {
        read(&self.generations)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        let mut generations = write(&self.generations);
        let before = generations.len();
        generations.retain(|(n, _)| n != name);
        generations.len() != before
    }

    /// First cached response for `url` across all generations.
    pub fn match_url(&self, url: &Url) -> Option<FetchResponse> {
        let key = cache_key(url);
        read(&self.generations)
            .iter()
            .find_map(|(_, cache)| cache.get(&key).map(|r| r.value().clone()))
    }
}

fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outcome of a successful `install` + `activate`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheStatus {
    pub cache_name: String,
    pub precached: usize,
    pub deleted: Vec<String>,
}

/// Intercepts shell requests and answers them from cache or network.
pub struct CacheManager {
    config: CacheConfig,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    view: ViewModel,
    installed: AtomicBool,
    controlling: AtomicBool,
    online: AtomicBool,
}

impl CacheManager {
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetcher>, view: ViewModel) -> Self {
        Self {
            config,
            storage: CacheStorage::default(),
            fetcher,
            view,
            installed: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
            online: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Whether the last navigation reached the network.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Resolve a shell path (relative or absolute) against the scope.
    pub fn resolve(&self, path: &str) -> Result<Url, CacheError> {
        self.config
            .scope
            .join(path)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Fetch every precache entry into the current generation.
    ///
    /// Any unreachable entry, or one answered with a non-2xx status, fails
    /// the whole install and nothing is stored.
    pub async fn install(&self) -> Result<usize, CacheError> {
        let urls = self
            .config
            .precache
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            cache = %self.config.cache_name,
            assets = urls.len(),
            "Installing app shell cache"
        );

        let fetched = try_join_all(urls.into_iter().map(|url| async move {
            let request = FetchRequest::resource(url.clone());
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => Ok((url, response)),
                Ok(response) => Err(CacheError::Install {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                }),
                Err(e) => Err(CacheError::Install {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
            }
        }))
        .await?;

        let cache = self.storage.open(&self.config.cache_name);
        let count = fetched.len();
        for (url, response) in fetched {
            cache.insert(cache_key(&url), response);
        }
        self.installed.store(true, Ordering::SeqCst);

        tracing::info!(cache = %self.config.cache_name, count, "App shell cached");
        Ok(count)
    }

    /// Delete every other generation and take control of clients.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        if !self.installed.load(Ordering::SeqCst) {
            return Err(CacheError::NotInstalled);
        }

        let stale: Vec<String> = self
            .storage
            .keys()
            .into_iter()
            .filter(|name| *name != self.config.cache_name)
            .collect();
        for name in &stale {
            self.storage.delete(name);
        }
        self.controlling.store(true, Ordering::SeqCst);

        tracing::info!(
            cache = %self.config.cache_name,
            deleted = ?stale,
            "Cache activated, controlling clients"
        );
        Ok(stale)
    }

    /// Run install and activate back to back.
    pub async fn reinstall(&self) -> Result<CacheStatus, CacheError> {
        let precached = self.install().await?;
        let deleted = self.activate()?;
        Ok(CacheStatus {
            cache_name: self.config.cache_name.clone(),
            precached,
            deleted,
        })
    }

    /// Answer a request according to the cache policy.
    pub async fn handle(&self, request: &FetchRequest) -> Result<FetchResponse, CacheError> {
        if self.is_tile_request(&request.url) {
            return Ok(self.handle_tile(request).await);
        }

        if !self.is_controlling() {
            return Ok(self.fetcher.fetch(request).await?);
        }

        match request.mode {
            RequestMode::Navigate => match self.fetcher.fetch(request).await {
                Ok(response) => {
                    self.set_online(true);
                    Ok(response)
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "Navigation offline, serving fallback page");
                    self.set_online(false);
                    self.offline_page()
                        .ok_or_else(|| CacheError::NetworkUnavailable(e.to_string()))
                }
            },
            RequestMode::Resource => {
                if let Some(cached) = self.storage.match_url(&request.url) {
                    return Ok(cached);
                }
                Ok(self.fetcher.fetch(request).await?)
            }
        }
    }

    /// Record a connectivity change, toasting only on transitions.
    fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }
        if online {
            tracing::info!("Network connection restored");
            self.view.toast(Toast::info(ONLINE_MESSAGE));
        } else {
            tracing::warn!("Network connection lost");
            self.view.toast(Toast::error(OFFLINE_MESSAGE));
        }
    }

    /// Cached copy of the offline fallback page.
    pub fn offline_page(&self) -> Option<FetchResponse> {
        let url = self.resolve(&self.config.offline_page).ok()?;
        self.storage.match_url(&url)
    }

    pub fn is_tile_request(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.config
            .tile_hosts
            .iter()
            .any(|tile| host == tile || host.ends_with(&format!(".{}", tile)))
    }

    async fn handle_tile(&self, request: &FetchRequest) -> FetchResponse {
        if let Some(cached) = self.storage.match_url(&request.url) {
            return cached;
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "Tile unreachable, answering empty");
                FetchResponse::empty()
            }
        }
    }
}

/// Page fetches made through the cache manager see the same policy as any
/// other client.
impl Fetcher for CacheManager {
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            self.handle(request)
                .await
                .map_err(|e| FetchError::Network(e.to_string()))
        })
    }
}

/// Errors from the cache manager.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to precache {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Cache must be installed before it is activated")]
    NotInstalled,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
}

impl From<FetchError> for CacheError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => CacheError::NetworkUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::view::ToastKind;
    use axum::body::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// In-memory origin that can be switched offline.
    #[derive(Default)]
    struct FakeNetwork {
        pages: Mutex<HashMap<String, (u16, &'static str)>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn serve(&self, url: &str, status: u16, body: &'static str) {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, body));
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    impl Fetcher for FakeNetwork {
        fn fetch<'a>(
            &'a self,
            request: &'a FetchRequest,
        ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.offline.load(Ordering::SeqCst) {
                    return Err(FetchError::Network("offline".into()));
                }
                let pages = self.pages.lock().unwrap();
                let (status, body) = pages
                    .get(request.url.as_str())
                    .copied()
                    .unwrap_or((404, "not found"));
                Ok(FetchResponse {
                    status,
                    content_type: Some("text/html".into()),
                    body: Bytes::from_static(body.as_bytes()),
                })
            })
        }
    }

    const ORIGIN: &str = "http://shell.test/";
    const OFFLINE_HTML: &str = "<main>You are offline</main>";

    fn setup() -> (Arc<FakeNetwork>, CacheManager) {
        let network = Arc::new(FakeNetwork::default());
        network.serve("http://shell.test/index.html", 200, "<main>home</main>");
        network.serve("http://shell.test/app.js", 200, "console.log(1)");
        network.serve("http://shell.test/views/offline.html", 200, OFFLINE_HTML);

        let config = CacheConfig {
            cache_name: "shell-v2".to_string(),
            scope: Url::parse(ORIGIN).unwrap(),
            precache: vec![
                "index.html".to_string(),
                "app.js".to_string(),
                "views/offline.html".to_string(),
            ],
            offline_page: "views/offline.html".to_string(),
            tile_hosts: vec!["tile.openstreetmap.org".to_string()],
        };
        let manager = CacheManager::new(config, network.clone(), ViewModel::new());
        (network, manager)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_install_precaches_everything() {
        let (_, manager) = setup();
        assert_eq!(manager.install().await.unwrap(), 3);
        assert!(manager
            .storage()
            .match_url(&url("http://shell.test/app.js"))
            .is_some());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (network, manager) = setup();
        network.serve("http://shell.test/app.js", 500, "boom");

        let err = manager.install().await.unwrap_err();
        assert!(matches!(err, CacheError::Install { .. }));
        assert!(manager.storage().keys().is_empty());
        assert!(matches!(manager.activate(), Err(CacheError::NotInstalled)));
    }

    #[tokio::test]
    async fn test_activate_deletes_old_generations() {
        let (_, manager) = setup();
        manager.storage().open("shell-v1");
        manager.install().await.unwrap();

        let deleted = manager.activate().unwrap();
        assert_eq!(deleted, vec!["shell-v1".to_string()]);
        assert_eq!(manager.storage().keys(), vec!["shell-v2".to_string()]);
        assert!(manager.is_controlling());
    }

    #[tokio::test]
    async fn test_offline_navigation_serves_fallback_page() {
        let (network, manager) = setup();
        manager.reinstall().await.unwrap();
        network.set_offline(true);

        let response = manager
            .handle(&FetchRequest::navigate(url("http://shell.test/history")))
            .await
            .unwrap();
        assert_eq!(response.body, Bytes::from_static(OFFLINE_HTML.as_bytes()));
    }

    #[tokio::test]
    async fn test_connectivity_changes_are_toasted_once() {
        let (network, manager) = setup();
        manager.reinstall().await.unwrap();
        let mut toasts = manager.view.subscribe_toasts();
        let home = FetchRequest::navigate(url("http://shell.test/index.html"));

        manager.handle(&home).await.unwrap();
        assert!(toasts.try_recv().is_err());

        network.set_offline(true);
        manager.handle(&home).await.unwrap();
        manager.handle(&home).await.unwrap();
        assert!(!manager.is_online());
        let toast = toasts.try_recv().unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, OFFLINE_MESSAGE);
        assert!(toasts.try_recv().is_err());

        // Cached resources do not count as a reconnection
        network.set_offline(false);
        manager
            .handle(&FetchRequest::resource(url("http://shell.test/app.js")))
            .await
            .unwrap();
        assert!(toasts.try_recv().is_err());

        manager.handle(&home).await.unwrap();
        manager.handle(&home).await.unwrap();
        assert!(manager.is_online());
        let toast = toasts.try_recv().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(toast.message, ONLINE_MESSAGE);
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_online_navigation_goes_to_network() {
        let (network, manager) = setup();
        manager.reinstall().await.unwrap();
        network.serve("http://shell.test/index.html", 200, "<main>fresh</main>");

        let response = manager
            .handle(&FetchRequest::navigate(url("http://shell.test/index.html")))
            .await
            .unwrap();
        assert_eq!(response.body, Bytes::from_static(b"<main>fresh</main>"));
    }

    #[tokio::test]
    async fn test_http_errors_pass_through_navigation() {
        let (_, manager) = setup();
        manager.reinstall().await.unwrap();

        let response = manager
            .handle(&FetchRequest::navigate(url("http://shell.test/missing")))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_resources_are_cache_first() {
        let (network, manager) = setup();
        manager.reinstall().await.unwrap();
        let calls = network.calls.load(Ordering::SeqCst);

        let response = manager
            .handle(&FetchRequest::resource(url("http://shell.test/app.js")))
            .await
            .unwrap();
        assert_eq!(response.body, Bytes::from_static(b"console.log(1)"));
        assert_eq!(network.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_uncached_resource_offline_is_an_error() {
        let (network, manager) = setup();
        manager.reinstall().await.unwrap();
        network.set_offline(true);

        let result = manager
            .handle(&FetchRequest::resource(url("http://shell.test/photo.png")))
            .await;
        assert!(matches!(result, Err(CacheError::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_tile_failure_is_empty_success() {
        let (network, manager) = setup();
        network.set_offline(true);

        let response = manager
            .handle(&FetchRequest::resource(url(
                "https://a.tile.openstreetmap.org/12/2200/1343.png",
            )))
            .await
            .unwrap();
        assert_eq!(response, FetchResponse::empty());
    }

    #[tokio::test]
    async fn test_uncontrolled_requests_go_to_network() {
        let (network, manager) = setup();
        network.set_offline(true);

        let result = manager
            .handle(&FetchRequest::navigate(url("http://shell.test/index.html")))
            .await;
        assert!(matches!(result, Err(CacheError::NetworkUnavailable(_))));
    }
}
