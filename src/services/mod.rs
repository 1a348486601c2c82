// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod camera;
pub mod distance;
pub mod fetch;
pub mod hike_store;
pub mod location;
pub mod map;
pub mod navigation;
pub mod offline_cache;
pub mod tracker;
pub mod tracking;
pub mod view;

pub use camera::{CameraSource, UploadedFrameCamera};
pub use fetch::{Fetcher, HttpFetcher};
pub use hike_store::{HikeStore, StoreError};
pub use location::{LocationSource, PushLocationSource, WatchOptions};
pub use navigation::PageNavigator;
pub use offline_cache::{CacheConfig, CacheManager};
pub use tracker::TrackerService;
pub use tracking::{TrackingError, TrackingSession};
pub use view::ViewModel;
