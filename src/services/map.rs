// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map adapter: routes and photos as GeoJSON for the map view.

use geo::{BoundingRect, LineString};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::json;

use crate::models::{HikeRecord, Position};

/// Line through the positions, `x = lng`, `y = lat`.
pub fn route_line(positions: &[Position]) -> LineString<f64> {
    LineString::from(
        positions
            .iter()
            .map(|p| (p.lng, p.lat))
            .collect::<Vec<_>>(),
    )
}

/// Route of one hike as a `LineString` feature.
pub fn route_feature(hike: &HikeRecord) -> Feature {
    let line = route_line(&hike.positions);
    feature(
        Some(Id::Number(hike.id.into())),
        Value::from(&line),
        json!({
            "kind": "route",
            "date": hike.date,
            "distanceKm": hike.distance_km,
            "durationDisplay": hike.duration_display,
        }),
    )
}

/// Geotagged photos as `Point` features; untagged photos are skipped.
pub fn photo_features(hike: &HikeRecord) -> Vec<Feature> {
    hike.photos
        .iter()
        .enumerate()
        .filter_map(|(index, photo)| {
            let (lat, lng) = (photo.lat?, photo.lng?);
            Some(feature(
                None,
                Value::Point(vec![lng, lat]),
                json!({
                    "kind": "photo",
                    "hikeId": hike.id,
                    "index": index,
                    "capturedAt": photo.captured_at,
                }),
            ))
        })
        .collect()
}

/// One hike with its photo markers.
pub fn hike_collection(hike: &HikeRecord) -> FeatureCollection {
    let mut features = vec![route_feature(hike)];
    features.extend(photo_features(hike));
    collection(features)
}

/// Every saved route, for the history map.
pub fn history_collection(hikes: &[HikeRecord]) -> FeatureCollection {
    collection(hikes.iter().map(route_feature).collect())
}

/// The route being recorded, from `(lng, lat)` pairs.
pub fn live_collection(route: &[(f64, f64)]) -> FeatureCollection {
    let line = LineString::from(route.to_vec());
    collection(vec![feature(
        None,
        Value::from(&line),
        json!({ "kind": "live" }),
    )])
}

/// Encoded polyline (precision 5) of a route.
pub fn encode_route(positions: &[Position]) -> Result<String, MapError> {
    polyline::encode_coordinates(route_line(positions), 5)
        .map_err(|e| MapError::Polyline(e.to_string()))
}

/// Region to pan the map to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    /// `[lng, lat]`
    pub center: [f64; 2],
    /// `[min_lng, min_lat, max_lng, max_lat]`
    pub bounds: [f64; 4],
}

/// Viewport covering all positions, or `None` when there are none.
pub fn viewport(positions: &[Position]) -> Option<Viewport> {
    let rect = route_line(positions).bounding_rect()?;
    let center = rect.center();
    Some(Viewport {
        center: [center.x, center.y],
        bounds: [rect.min().x, rect.min().y, rect.max().x, rect.max().y],
    })
}

fn feature(id: Option<Id>, value: Value, properties: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id,
        properties,
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Errors from the map adapter.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Failed to encode polyline: {0}")]
    Polyline(String),
}
