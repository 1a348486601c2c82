// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hike Tracker Server
//!
//! Records hikes from the browser's location and camera, keeps them in local
//! storage, and serves the app shell through an offline cache.

use hike_tracker::{config::Config, db::LocalStorage, services::HttpFetcher, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Hike Tracker");

    // Open local storage
    let storage = LocalStorage::open(&config.data_dir, config.storage_quota_bytes)?;

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        storage,
        Arc::new(HttpFetcher::new()),
    )?);
    tracing::info!(hikes = state.hikes.list().len(), "Hike history loaded");

    // Precache the app shell in the background; until it succeeds requests
    // go straight to the network.
    let cache = state.cache.clone();
    tokio::spawn(async move {
        match cache.reinstall().await {
            Ok(status) => tracing::info!(
                cache = %status.cache_name,
                precached = status.precached,
                deleted = ?status.deleted,
                "Offline cache ready"
            ),
            Err(e) => tracing::error!(error = %e, "Offline cache install failed"),
        }
    });

    // Build router
    let app = hike_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hike_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
