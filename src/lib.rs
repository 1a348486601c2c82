// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Hike Tracker: offline-capable hike recording
//!
//! This crate provides the backend for the hiking-tracker PWA: the live
//! tracking session, the local hike store, and the offline cache that keeps
//! the app shell usable without a network.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::{Config, ConfigError};
use db::LocalStorage;
use services::{
    CacheManager, Fetcher, HikeStore, PushLocationSource, TrackerService, UploadedFrameCamera,
    ViewModel,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub view: ViewModel,
    pub hikes: Arc<HikeStore>,
    pub tracker: TrackerService,
    pub location: Arc<PushLocationSource>,
    pub camera: Arc<UploadedFrameCamera>,
    pub cache: Arc<CacheManager>,
}

impl AppState {
    /// Wire up every service from the config, a storage handle and the
    /// network.
    pub fn new(
        config: Config,
        storage: LocalStorage,
        network: Arc<dyn Fetcher>,
    ) -> Result<Self, ConfigError> {
        let view = ViewModel::new();
        let hikes = Arc::new(HikeStore::new(storage, view.clone()));
        let location = Arc::new(PushLocationSource::new(config.location_enabled));
        let camera = Arc::new(UploadedFrameCamera::new(config.camera_enabled));
        let tracker = TrackerService::new(
            location.clone(),
            camera.clone(),
            hikes.clone(),
            view.clone(),
            config.watch_options(),
        );
        let cache = Arc::new(CacheManager::new(config.cache_config()?, network, view.clone()));

        Ok(Self {
            config,
            view,
            hikes,
            tracker,
            location,
            camera,
            cache,
        })
    }
}
