// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live tracking, camera and event-stream routes.

use crate::error::{AppError, Result};
use crate::models::{HikeRecord, LocationSample, Photo, Readout, TrackingState};
use crate::services::camera::Frame;
use crate::services::location::LocationError;
use crate::services::map;
use crate::services::view::{HistoryView, Toast};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::Stream;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use validator::Validate;

/// Camera frames are full JPEG/PNG images; allow more than the default limit.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tracking", get(get_tracking))
        .route("/api/tracking/start", post(start_tracking))
        .route("/api/tracking/stop", post(stop_tracking))
        .route("/api/tracking/positions", post(push_position))
        .route("/api/tracking/location-error", post(push_location_error))
        .route("/api/tracking/save", post(save_hike))
        .route("/api/tracking/route", get(get_live_route))
        .route("/api/camera", post(attach_camera).delete(detach_camera))
        .route(
            "/api/camera/frame",
            put(upload_frame).layer(DefaultBodyLimit::max(MAX_FRAME_BYTES)),
        )
        .route("/api/camera/capture", post(capture_photo))
        .route("/api/events", get(events))
}

// ─── Session ─────────────────────────────────────────────────

/// Tracking screen state.
#[derive(Serialize)]
pub struct TrackingStatus {
    pub state: TrackingState,
    pub readout: Readout,
    pub camera_attached: bool,
}

async fn status(state: &AppState) -> TrackingStatus {
    TrackingStatus {
        state: state.tracker.state().await,
        readout: state.tracker.readout().await,
        camera_attached: state.tracker.camera_attached().await,
    }
}

async fn get_tracking(State(state): State<Arc<AppState>>) -> Json<TrackingStatus> {
    Json(status(&state).await)
}

async fn start_tracking(State(state): State<Arc<AppState>>) -> Result<Json<TrackingStatus>> {
    if let Err(e) = state.tracker.start().await {
        state.view.toast(Toast::error(e.to_string()));
        return Err(e.into());
    }
    Ok(Json(status(&state).await))
}

async fn stop_tracking(State(state): State<Arc<AppState>>) -> Json<TrackingStatus> {
    state.tracker.stop().await;
    Json(status(&state).await)
}

#[derive(Serialize)]
pub struct PositionResponse {
    /// False when no tracking session is listening
    pub accepted: bool,
}

async fn push_position(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<LocationSample>,
) -> Result<Json<PositionResponse>> {
    sample
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid position: {}", e)))?;

    let accepted = state.location.push(sample);
    if !accepted {
        tracing::debug!("Position received while not tracking");
    }
    Ok(Json(PositionResponse { accepted }))
}

/// Geolocation failure reported by the browser.
#[derive(Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
enum LocationErrorPayload {
    PermissionDenied,
    PositionUnavailable { message: Option<String> },
    Timeout,
}

async fn push_location_error(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LocationErrorPayload>,
) -> Json<PositionResponse> {
    let error = match payload {
        LocationErrorPayload::PermissionDenied => LocationError::PermissionDenied,
        LocationErrorPayload::PositionUnavailable { message } => {
            LocationError::PositionUnavailable(message.unwrap_or_default())
        }
        LocationErrorPayload::Timeout => LocationError::Timeout,
    };
    let accepted = state.location.push_error(error);
    Json(PositionResponse { accepted })
}

async fn save_hike(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<HikeRecord>)> {
    let record = state.tracker.save().await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_live_route(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    Json(map::live_collection(&state.tracker.route().await))
}

// ─── Camera ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CameraStatus {
    pub attached: bool,
}

async fn attach_camera(State(state): State<Arc<AppState>>) -> Result<Json<CameraStatus>> {
    state.tracker.attach_camera().await?;
    Ok(Json(CameraStatus { attached: true }))
}

async fn detach_camera(State(state): State<Arc<AppState>>) -> Json<CameraStatus> {
    state.tracker.detach_camera().await;
    Json(CameraStatus { attached: false })
}

async fn upload_frame(State(state): State<Arc<AppState>>, body: Bytes) -> Result<StatusCode> {
    let frame = Frame::from_encoded(body.to_vec())?;
    state.camera.push_frame(frame)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn capture_photo(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Photo>)> {
    let photo = state.tracker.capture_photo().await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

// ─── Events ──────────────────────────────────────────────────

struct EventSources {
    toasts: broadcast::Receiver<Toast>,
    readout: watch::Receiver<Readout>,
    route: watch::Receiver<Vec<(f64, f64)>>,
    history: watch::Receiver<HistoryView>,
}

/// Server-sent events:
/// - `toast`: transient notifications
/// - `readout`: tracking screen values
/// - `route`: the live route as a GeoJSON feature collection
/// - `history`: saved hikes (most recent first) with their summary
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let sources = EventSources {
        toasts: state.view.subscribe_toasts(),
        readout: state.view.subscribe_readout(),
        route: state.view.subscribe_route(),
        history: state.view.subscribe_history(),
    };

    let stream = futures_util::stream::unfold(sources, |mut sources| async move {
        loop {
            let event = tokio::select! {
                toast = sources.toasts.recv() => match toast {
                    Ok(toast) => Event::default().event("toast").json_data(&toast),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Event stream lagged, dropping toasts");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                changed = sources.readout.changed() => {
                    changed.ok()?;
                    let readout = sources.readout.borrow_and_update().clone();
                    Event::default().event("readout").json_data(&readout)
                }
                changed = sources.route.changed() => {
                    changed.ok()?;
                    let route = sources.route.borrow_and_update().clone();
                    Event::default().event("route").json_data(map::live_collection(&route))
                }
                changed = sources.history.changed() => {
                    changed.ok()?;
                    let history = sources.history.borrow_and_update().clone();
                    Event::default().event("history").json_data(&history)
                }
            };
            return Some((event, sources));
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
