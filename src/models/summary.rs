//! Aggregate figures over the saved hikes.
//!
//! Recomputed from the full list on every read; there is no cached copy.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::HikeRecord;

/// Totals shown above the hike history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HikeSummary {
    /// Number of saved hikes
    pub count: u32,
    /// Sum of every hike's distance
    pub total_distance_km: f64,
    /// Photos across all hikes
    pub total_photos: u32,
}

impl HikeSummary {
    /// Build the summary from a list of hikes.
    pub fn from_hikes(hikes: &[HikeRecord]) -> Self {
        let mut summary = Self::default();
        for hike in hikes {
            summary.add(hike);
        }
        summary
    }

    fn add(&mut self, hike: &HikeRecord) {
        self.count += 1;
        self.total_distance_km += hike.distance_km;
        self.total_photos += hike.photos.len() as u32;
    }
}
