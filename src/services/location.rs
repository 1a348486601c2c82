// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location-update sources.
//!
//! A source hands out a [`LocationWatch`]: an event stream plus a guard
//! whose drop releases the subscription. Whoever holds the guard owns the
//! subscription, so every teardown path releases it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::LocationSample;
use crate::services::tracking::TrackingError;

/// Options passed to a location subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Time allowed to acquire a fix before a timeout is reported
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Errors reported through an active subscription.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Location request timed out")]
    Timeout,
}

/// One event on a location subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationSample),
    Error(LocationError),
}

/// Releases a subscription when dropped.
pub struct WatchGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl WatchGuard {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// An active location subscription.
pub struct LocationWatch {
    pub events: mpsc::UnboundedReceiver<LocationEvent>,
    pub guard: WatchGuard,
}

/// Something that can deliver a continuous stream of location fixes.
pub trait LocationSource: Send + Sync {
    /// Subscribe to location updates. Fails with
    /// [`TrackingError::LocationUnavailable`] when the capability is missing
    /// or denied.
    fn watch(&self, options: &WatchOptions) -> Result<LocationWatch, TrackingError>;
}

/// Location source fed by the client pushing fixes over HTTP.
///
/// At most one subscription is live at a time; a new watch replaces the
/// previous sender, and a stale guard never clears a newer one.
pub struct PushLocationSource {
    enabled: bool,
    current: Arc<Mutex<Option<(u64, mpsc::UnboundedSender<LocationEvent>)>>>,
    next_id: AtomicU64,
    active: Arc<AtomicUsize>,
}

impl PushLocationSource {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deliver a fix to the live subscription. Returns `false` when nobody
    /// is watching.
    pub fn push(&self, sample: LocationSample) -> bool {
        self.send(LocationEvent::Fix(sample))
    }

    /// Deliver a location error to the live subscription.
    pub fn push_error(&self, error: LocationError) -> bool {
        self.send(LocationEvent::Error(error))
    }

    /// Number of subscriptions not yet released.
    pub fn active_watches(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn send(&self, event: LocationEvent) -> bool {
        let current = lock(&self.current);
        match current.as_ref() {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl LocationSource for PushLocationSource {
    fn watch(&self, options: &WatchOptions) -> Result<LocationWatch, TrackingError> {
        if !self.enabled {
            return Err(TrackingError::LocationUnavailable(
                "location updates are disabled on this device".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = Some((id, tx));
        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(watch_id = id, timeout = ?options.timeout, "Location watch started");

        let current = Arc::clone(&self.current);
        let active = Arc::clone(&self.active);
        let guard = WatchGuard::new(move || {
            let mut current = lock(&current);
            if matches!(current.as_ref(), Some((live, _)) if *live == id) {
                *current = None;
            }
            active.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(watch_id = id, "Location watch released");
        });

        Ok(LocationWatch { events: rx, guard })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
