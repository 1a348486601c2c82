// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Live tracking inputs and the readouts published while tracking.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::models::Position;

/// A location fix as delivered by the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct LocationSample {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[serde(default)]
    pub alt: Option<f64>,
    /// Instantaneous speed in m/s, when the device reports it
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,
    /// Horizontal accuracy in meters
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
}

impl LocationSample {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            alt: None,
            speed: None,
            accuracy: None,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            lat: self.lat,
            lng: self.lng,
            alt: self.alt,
        }
    }
}

/// Lifecycle state of the tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Idle,
    Active,
}

/// Display values for the tracking screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Readout {
    pub tracking: bool,
    /// Elapsed time as `HH:MM:SS`
    pub elapsed: String,
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub altitude_m: Option<f64>,
    pub samples: usize,
    pub photos: usize,
}

impl Default for Readout {
    /// Placeholder values shown before tracking starts and after a save.
    fn default() -> Self {
        Self {
            tracking: false,
            elapsed: "00:00:00".to_string(),
            distance_km: 0.0,
            speed_kmh: 0.0,
            altitude_m: None,
            samples: 0,
            photos: 0,
        }
    }
}
