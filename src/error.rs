// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::hike_store::StoreError;
use crate::services::map::MapError;
use crate::services::navigation::NavigationError;
use crate::services::offline_cache::CacheError;
use crate::services::tracking::TrackingError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Camera access denied: {0}")]
    CameraAccessDenied(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Storage quota exceeded")]
    StorageQuotaExceeded,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error code used in response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::LocationUnavailable(_) => "location_unavailable",
            AppError::CameraAccessDenied(_) => "camera_access_denied",
            AppError::NetworkUnavailable(_) => "network_unavailable",
            AppError::StorageQuotaExceeded => "storage_quota_exceeded",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::LocationUnavailable(_) | AppError::NetworkUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::CameraAccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::StorageQuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::LocationUnavailable(msg)
            | AppError::CameraAccessDenied(msg)
            | AppError::NetworkUnavailable(msg) => Some(msg.clone()),
            AppError::StorageQuotaExceeded => None,
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StorageQuotaExceeded => AppError::StorageQuotaExceeded,
            StoreError::DuplicateId(id) => AppError::Conflict(format!("Hike {} already exists", id)),
            StoreError::Encode(msg) | StoreError::Storage(msg) => {
                AppError::Internal(anyhow::anyhow!("Hike storage failed: {}", msg))
            }
        }
    }
}

impl From<TrackingError> for AppError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::LocationUnavailable(msg) => AppError::LocationUnavailable(msg),
            TrackingError::LocationTimeout => {
                AppError::LocationUnavailable(TrackingError::LocationTimeout.to_string())
            }
            TrackingError::CameraAccessDenied(msg) => AppError::CameraAccessDenied(msg),
            TrackingError::InvalidFrame => AppError::BadRequest(err.to_string()),
            TrackingError::CameraNotAttached
            | TrackingError::NoFrame
            | TrackingError::StillTracking
            | TrackingError::NoSamples => AppError::Conflict(err.to_string()),
            TrackingError::Store(e) => e.into(),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NetworkUnavailable(msg) => AppError::NetworkUnavailable(msg),
            CacheError::Install { .. } => AppError::NetworkUnavailable(err.to_string()),
            CacheError::InvalidUrl(msg) => AppError::BadRequest(msg),
            CacheError::NotInstalled => AppError::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<NavigationError> for AppError {
    fn from(err: NavigationError) -> Self {
        AppError::NetworkUnavailable(err.to_string())
    }
}

impl From<MapError> for AppError {
    fn from(err: MapError) -> Self {
        AppError::Internal(anyhow::anyhow!(err.to_string()))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
