// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Saved-hike routes: history, summary, deletion and maps.

use crate::error::{AppError, Result};
use crate::models::{HikeRecord, HikeSummary};
use crate::services::map::{self, Viewport};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use geojson::FeatureCollection;
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/hikes", get(list_hikes))
        .route("/api/hikes/summary", get(get_summary))
        .route("/api/hikes/{id}", get(get_hike).delete(delete_hike))
        .route("/api/hikes/{id}/geojson", get(get_hike_map))
        .route("/api/map/history", get(get_history_map))
}

// ─── History ─────────────────────────────────────────────────

/// History list response.
#[derive(Serialize)]
pub struct HikesResponse {
    /// Most recent first
    pub hikes: Vec<HikeRecord>,
    pub summary: HikeSummary,
}

async fn list_hikes(State(state): State<Arc<AppState>>) -> Json<HikesResponse> {
    let stored = state.hikes.list();
    let summary = HikeSummary::from_hikes(&stored);
    Json(HikesResponse {
        hikes: stored.into_iter().rev().collect(),
        summary,
    })
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Json<HikeSummary> {
    Json(state.hikes.aggregate())
}

async fn get_hike(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<HikeRecord>> {
    state
        .hikes
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Hike {} not found", id)))
}

// ─── Deletion ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DeleteHikeResponse {
    /// False when no hike had this id
    pub deleted: bool,
}

async fn delete_hike(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteHikeResponse>> {
    let deleted = state.hikes.delete(id)?;
    Ok(Json(DeleteHikeResponse { deleted }))
}

// ─── Maps ────────────────────────────────────────────────────

/// One hike prepared for the map view.
#[derive(Serialize)]
pub struct HikeMapResponse {
    pub features: FeatureCollection,
    pub polyline: String,
    pub viewport: Option<Viewport>,
}

async fn get_hike_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<HikeMapResponse>> {
    let hike = state
        .hikes
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Hike {} not found", id)))?;

    Ok(Json(HikeMapResponse {
        features: map::hike_collection(&hike),
        polyline: map::encode_route(&hike.positions)?,
        viewport: map::viewport(&hike.positions),
    }))
}

async fn get_history_map(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    Json(map::history_collection(&state.hikes.list()))
}
