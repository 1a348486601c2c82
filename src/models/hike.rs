// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Saved hike records and the versioned payload they are stored in.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Current version of the stored payload.
pub const SCHEMA_VERSION: u32 = 1;

/// One completed hike. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HikeRecord {
    /// Creation time in Unix milliseconds, unique within the store
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    /// Human-readable creation time
    pub date: String,
    /// Elapsed time as `HH:MM:SS`
    pub duration_display: String,
    /// Cumulative haversine distance
    pub distance_km: f64,
    /// Samples in capture order
    pub positions: Vec<Position>,
    /// Photos in capture order
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// A recorded position sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

/// A photo snapped during a hike, tagged with the last known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Photo {
    /// `data:` URL of the encoded image
    pub image_data: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Capture time (RFC 3339)
    pub captured_at: String,
}

impl HikeRecord {
    /// Route coordinates as `(lng, lat)` pairs, the order geo types expect.
    pub fn route_coords(&self) -> Vec<(f64, f64)> {
        self.positions.iter().map(|p| (p.lng, p.lat)).collect()
    }
}

/// Payload stored under the hikes key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HikeArchive {
    pub version: u32,
    pub hikes: Vec<HikeRecord>,
}

impl Default for HikeArchive {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            hikes: Vec::new(),
        }
    }
}

impl HikeArchive {
    /// Decode a stored payload, migrating older layouts.
    ///
    /// Version 0 is the bare JSON array written before the payload carried a
    /// version; records from that era may lack photos and photo geotags,
    /// which serde defaults fill in.
    pub fn decode(raw: &str) -> Result<Self, MalformedArchive> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| MalformedArchive(e.to_string()))?;

        match value {
            serde_json::Value::Array(_) => {
                let hikes: Vec<HikeRecord> =
                    serde_json::from_value(value).map_err(|e| MalformedArchive(e.to_string()))?;
                tracing::info!(count = hikes.len(), "Migrated unversioned hike payload");
                Ok(Self {
                    version: SCHEMA_VERSION,
                    hikes,
                })
            }
            serde_json::Value::Object(ref obj) => {
                let version = obj.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
                if version != u64::from(SCHEMA_VERSION) {
                    return Err(MalformedArchive(format!(
                        "unsupported payload version {}",
                        version
                    )));
                }
                serde_json::from_value(value).map_err(|e| MalformedArchive(e.to_string()))
            }
            _ => Err(MalformedArchive("payload is neither array nor object".into())),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The stored payload could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("Malformed stored data: {0}")]
pub struct MalformedArchive(pub String);
