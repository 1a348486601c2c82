// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod hike;
pub mod session;
pub mod summary;

pub use hike::{HikeArchive, HikeRecord, Photo, Position};
pub use session::{LocationSample, Readout, TrackingState};
pub use summary::HikeSummary;
