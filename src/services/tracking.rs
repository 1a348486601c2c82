// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live tracking session state machine.
//!
//! `Idle -> Active -> Idle`, with no paused state. The session only holds
//! the buffers and the clock; subscriptions and timers belong to
//! [`TrackerService`](crate::services::TrackerService), which drives it.

use chrono::{DateTime, Utc};

use crate::models::{HikeRecord, LocationSample, Photo, Position, Readout, TrackingState};
use crate::services::distance::{haversine_km, speed_kmh};
use crate::services::hike_store::StoreError;
use crate::time_utils::{format_display_date, format_hms, format_utc_rfc3339};

/// In-memory state of one tracking run.
#[derive(Debug)]
pub struct TrackingSession {
    state: TrackingState,
    positions: Vec<Position>,
    photos: Vec<Photo>,
    distance_km: f64,
    started_at: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
    last_altitude: Option<f64>,
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingSession {
    pub fn new() -> Self {
        Self {
            state: TrackingState::Idle,
            positions: Vec::new(),
            photos: Vec::new(),
            distance_km: 0.0,
            started_at: None,
            elapsed_seconds: 0,
            last_altitude: None,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackingState::Active
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Enter `Active` with fresh buffers. Returns `false` (and changes
    /// nothing) when already active.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active() {
            return false;
        }
        self.reset();
        self.state = TrackingState::Active;
        self.started_at = Some(now);
        true
    }

    /// Return to `Idle`, freezing the elapsed time. Buffers are kept until
    /// the next save or start. Returns `false` when already idle.
    pub fn stop(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.tick(now);
        self.state = TrackingState::Idle;
        true
    }

    /// Recompute elapsed time from the wall clock.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let (TrackingState::Active, Some(started)) = (self.state, self.started_at) {
            self.elapsed_seconds = (now - started).num_seconds().max(0) as u64;
        }
    }

    /// Append a location sample and extend the distance. Samples arriving
    /// while idle are ignored and `false` is returned.
    pub fn record_position(&mut self, sample: LocationSample) -> bool {
        if !self.is_active() {
            return false;
        }
        let position = sample.position();
        if let Some(previous) = self.positions.last() {
            self.distance_km += haversine_km(previous, &position);
        }
        if position.alt.is_some() {
            self.last_altitude = position.alt;
        }
        self.positions.push(position);
        true
    }

    /// Append a photo tagged with the most recent known position.
    pub fn add_photo(&mut self, image_data: String, now: DateTime<Utc>) -> &Photo {
        let last = self.positions.last();
        self.photos.push(Photo {
            image_data,
            lat: last.map(|p| p.lat),
            lng: last.map(|p| p.lng),
            captured_at: format_utc_rfc3339(now),
        });
        &self.photos[self.photos.len() - 1]
    }

    /// Flatten the buffers into a record ready for the store.
    ///
    /// Only valid once stopped and with at least one sample recorded.
    pub fn build_record(&self, id: u64, now: DateTime<Utc>) -> Result<HikeRecord, TrackingError> {
        if self.is_active() {
            return Err(TrackingError::StillTracking);
        }
        if self.positions.is_empty() {
            return Err(TrackingError::NoSamples);
        }
        Ok(HikeRecord {
            id,
            date: format_display_date(now),
            duration_display: format_hms(self.elapsed_seconds),
            distance_km: self.distance_km,
            positions: self.positions.clone(),
            photos: self.photos.clone(),
        })
    }

    /// Drop all buffers and readouts.
    pub fn reset(&mut self) {
        self.positions.clear();
        self.photos.clear();
        self.distance_km = 0.0;
        self.started_at = None;
        self.elapsed_seconds = 0;
        self.last_altitude = None;
    }

    pub fn readout(&self) -> Readout {
        Readout {
            tracking: self.is_active(),
            elapsed: format_hms(self.elapsed_seconds),
            distance_km: self.distance_km,
            speed_kmh: speed_kmh(self.distance_km, self.elapsed_seconds),
            altitude_m: self.last_altitude,
            samples: self.positions.len(),
            photos: self.photos.len(),
        }
    }

    /// Live route as `(lng, lat)` pairs.
    pub fn route(&self) -> Vec<(f64, f64)> {
        self.positions.iter().map(|p| (p.lng, p.lat)).collect()
    }
}

/// Errors from tracking operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Timed out waiting for a location fix")]
    LocationTimeout,

    #[error("Camera access denied: {0}")]
    CameraAccessDenied(String),

    #[error("No camera attached")]
    CameraNotAttached,

    #[error("Camera has not produced a frame yet")]
    NoFrame,

    #[error("Frame is not a JPEG or PNG image")]
    InvalidFrame,

    #[error("Tracking is still active; stop it before saving")]
    StillTracking,

    #[error("No positions recorded")]
    NoSamples,

    #[error(transparent)]
    Store(#[from] StoreError),
}
