// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracker service: owns the tracking session and its resources.
//!
//! While active, one task multiplexes the 1 s display tick and the location
//! stream. Both mutate the session under the same mutex, so updates apply
//! one at a time in whatever order they arrive.
//!
//! The location watch guard and the camera stream are held here and dropped
//! on every teardown path, which releases the underlying subscription.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{HikeRecord, Photo, Readout, TrackingState};
use crate::services::camera::{CameraSource, CameraStream};
use crate::services::hike_store::HikeStore;
use crate::services::location::{LocationEvent, LocationSource, WatchGuard, WatchOptions};
use crate::services::tracking::{TrackingError, TrackingSession};
use crate::services::view::{Toast, ViewModel};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

struct TrackerInner {
    session: TrackingSession,
    runner: Option<Runner>,
    camera: Option<CameraStream>,
}

struct Runner {
    task: JoinHandle<()>,
    _watch: WatchGuard,
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drives the tracking session from location events and the display timer.
pub struct TrackerService {
    inner: Arc<Mutex<TrackerInner>>,
    location: Arc<dyn LocationSource>,
    camera: Arc<dyn CameraSource>,
    store: Arc<HikeStore>,
    view: ViewModel,
    options: WatchOptions,
}

impl TrackerService {
    pub fn new(
        location: Arc<dyn LocationSource>,
        camera: Arc<dyn CameraSource>,
        store: Arc<HikeStore>,
        view: ViewModel,
        options: WatchOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                session: TrackingSession::new(),
                runner: None,
                camera: None,
            })),
            location,
            camera,
            store,
            view,
            options,
        }
    }

    /// Start tracking. Returns `Ok(false)` if already active, without a
    /// second subscription or timer.
    pub async fn start(&self) -> Result<bool, TrackingError> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_active() {
            tracing::debug!("Start ignored: already tracking");
            return Ok(false);
        }

        // Subscribe first: on failure nothing has changed.
        let watch = self.location.watch(&self.options)?;

        inner.session.start(Utc::now());
        let task = tokio::spawn(run_session(
            Arc::clone(&self.inner),
            watch.events,
            self.view.clone(),
            self.options.timeout,
        ));
        inner.runner = Some(Runner {
            task,
            _watch: watch.guard,
        });

        self.view.publish_readout(inner.session.readout());
        self.view.publish_route(Vec::new());
        tracing::info!("Tracking started");
        Ok(true)
    }

    /// Stop tracking. Returns `false` if already idle.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        // Dropping the runner aborts the task and releases the watch.
        inner.runner = None;
        if !inner.session.stop(Utc::now()) {
            return false;
        }

        let readout = inner.session.readout();
        tracing::info!(
            distance_km = readout.distance_km,
            samples = readout.samples,
            elapsed = %readout.elapsed,
            "Tracking stopped"
        );
        self.view.publish_readout(readout);
        true
    }

    /// Persist the stopped session as a hike.
    ///
    /// On success the buffers are cleared and readouts reset. On failure the
    /// buffers stay in memory so the save can be retried. The camera is
    /// released either way.
    pub async fn save(&self) -> Result<HikeRecord, TrackingError> {
        let mut inner = self.inner.lock().await;
        if inner.camera.take().is_some() {
            tracing::debug!("Camera released on save");
        }

        let now = Utc::now();
        let id = self.store.next_id(now.timestamp_millis().max(0) as u64);
        let record = inner.session.build_record(id, now)?;

        if let Err(e) = self.store.append(&record) {
            tracing::warn!(error = %e, hike_id = id, "Save failed; hike kept in memory");
            self.view
                .toast(Toast::error(format!("Could not save hike: {}", e)));
            return Err(e.into());
        }

        inner.session.reset();
        self.view.publish_readout(Readout::default());
        self.view.publish_route(Vec::new());
        self.view.toast(Toast::info("Hike saved"));
        Ok(record)
    }

    /// Attach the camera. Returns `Ok(false)` if one is already attached.
    pub async fn attach_camera(&self) -> Result<bool, TrackingError> {
        let mut inner = self.inner.lock().await;
        if inner.camera.is_some() {
            return Ok(false);
        }
        match self.camera.open() {
            Ok(stream) => {
                inner.camera = Some(stream);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Camera unavailable");
                self.view.toast(Toast::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Detach and release the camera. Returns whether one was attached.
    pub async fn detach_camera(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.camera.take().is_some()
    }

    pub async fn camera_attached(&self) -> bool {
        self.inner.lock().await.camera.is_some()
    }

    /// Snapshot the camera into the photo buffer.
    pub async fn capture_photo(&self) -> Result<Photo, TrackingError> {
        let mut inner = self.inner.lock().await;
        let image = inner
            .camera
            .as_ref()
            .ok_or(TrackingError::CameraNotAttached)?
            .snapshot()?;
        let photo = inner.session.add_photo(image, Utc::now()).clone();
        self.view.publish_readout(inner.session.readout());
        tracing::info!(lat = ?photo.lat, lng = ?photo.lng, "Photo captured");
        Ok(photo)
    }

    pub async fn state(&self) -> TrackingState {
        self.inner.lock().await.session.state()
    }

    /// Current readout, with elapsed time brought up to date.
    pub async fn readout(&self) -> Readout {
        let mut inner = self.inner.lock().await;
        inner.session.tick(Utc::now());
        inner.session.readout()
    }

    /// Live route as `(lng, lat)` pairs.
    pub async fn route(&self) -> Vec<(f64, f64)> {
        self.inner.lock().await.session.route()
    }
}

/// Event loop for one active session. Ends when the location stream closes
/// or the task is aborted by `stop`.
async fn run_session(
    inner: Arc<Mutex<TrackerInner>>,
    mut events: mpsc::UnboundedReceiver<LocationEvent>,
    view: ViewModel,
    fix_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let fix_deadline = tokio::time::sleep(fix_timeout);
    tokio::pin!(fix_deadline);
    let mut awaiting_fix = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut inner = inner.lock().await;
                inner.session.tick(Utc::now());
                view.publish_readout(inner.session.readout());
            }
            event = events.recv() => match event {
                Some(LocationEvent::Fix(sample)) => {
                    let mut inner = inner.lock().await;
                    inner.session.tick(Utc::now());
                    if inner.session.record_position(sample) {
                        view.publish_readout(inner.session.readout());
                        view.publish_route(inner.session.route());
                    }
                    awaiting_fix = true;
                    fix_deadline.as_mut().reset(Instant::now() + fix_timeout);
                }
                Some(LocationEvent::Error(err)) => {
                    tracing::warn!(error = %err, "Location error");
                    view.toast(Toast::error(err.to_string()));
                }
                None => {
                    tracing::debug!("Location stream closed");
                    break;
                }
            },
            _ = &mut fix_deadline, if awaiting_fix => {
                // Reported once per silence; the next fix re-arms it.
                awaiting_fix = false;
                tracing::warn!(timeout = ?fix_timeout, "No location fix within timeout");
                view.toast(Toast::error(TrackingError::LocationTimeout.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStorage;
    use crate::models::LocationSample;
    use crate::services::camera::{Frame, UploadedFrameCamera};
    use crate::services::location::PushLocationSource;

    struct Harness {
        tracker: TrackerService,
        location: Arc<PushLocationSource>,
        camera: Arc<UploadedFrameCamera>,
        store: Arc<HikeStore>,
        view: ViewModel,
    }

    fn harness(quota: usize) -> Harness {
        let view = ViewModel::new();
        let store = Arc::new(HikeStore::new(LocalStorage::in_memory(quota), view.clone()));
        let location = Arc::new(PushLocationSource::new(true));
        let camera = Arc::new(UploadedFrameCamera::new(true));
        let tracker = TrackerService::new(
            location.clone(),
            camera.clone(),
            store.clone(),
            view.clone(),
            WatchOptions::default(),
        );
        Harness {
            tracker,
            location,
            camera,
            store,
            view,
        }
    }

    /// Push a fix and wait until the session task has applied it.
    async fn push_and_wait(h: &Harness, lat: f64, lng: f64) {
        let before = h.tracker.readout().await.samples;
        assert!(h.location.push(LocationSample::new(lat, lng)));
        for _ in 0..200 {
            if h.tracker.readout().await.samples > before {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fix was never applied");
    }

    #[tokio::test]
    async fn test_start_twice_subscribes_once() {
        let h = harness(1 << 20);
        assert!(h.tracker.start().await.unwrap());
        assert!(!h.tracker.start().await.unwrap());
        assert_eq!(h.location.active_watches(), 1);
        assert_eq!(h.tracker.state().await, TrackingState::Active);
    }

    #[tokio::test]
    async fn test_stop_twice_releases_once() {
        let h = harness(1 << 20);
        h.tracker.start().await.unwrap();
        assert!(h.tracker.stop().await);
        assert!(!h.tracker.stop().await);
        assert_eq!(h.location.active_watches(), 0);
        assert_eq!(h.tracker.state().await, TrackingState::Idle);
    }

    #[tokio::test]
    async fn test_start_fails_without_location() {
        let view = ViewModel::new();
        let store = Arc::new(HikeStore::new(LocalStorage::in_memory(1024), view.clone()));
        let tracker = TrackerService::new(
            Arc::new(PushLocationSource::new(false)),
            Arc::new(UploadedFrameCamera::new(true)),
            store,
            view,
            WatchOptions::default(),
        );

        assert!(matches!(
            tracker.start().await,
            Err(TrackingError::LocationUnavailable(_))
        ));
        assert_eq!(tracker.state().await, TrackingState::Idle);
    }

    #[tokio::test]
    async fn test_track_stop_save_round_trip() {
        let h = harness(1 << 20);
        h.tracker.start().await.unwrap();
        push_and_wait(&h, 52.0, 19.0).await;
        push_and_wait(&h, 52.001, 19.0).await;
        push_and_wait(&h, 52.002, 19.0).await;
        h.tracker.stop().await;

        let before = h.store.list().len();
        let record = h.tracker.save().await.unwrap();
        let hikes = h.store.list();

        assert_eq!(hikes.len(), before + 1);
        assert_eq!(hikes.last().unwrap(), &record);
        assert!((record.distance_km - 0.2224).abs() < 0.001);
        assert_eq!(h.view.readout(), Readout::default());

        assert!(h.store.delete(record.id).unwrap());
        assert_eq!(h.store.list().len(), before);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_buffers() {
        // Big enough for nothing but a tiny payload.
        let h = harness(64);
        h.tracker.start().await.unwrap();
        push_and_wait(&h, 52.0, 19.0).await;
        push_and_wait(&h, 52.001, 19.0).await;
        h.tracker.stop().await;

        let err = h.tracker.save().await.unwrap_err();
        assert!(matches!(
            err,
            TrackingError::Store(crate::services::hike_store::StoreError::StorageQuotaExceeded)
        ));
        assert_eq!(h.tracker.readout().await.samples, 2);
        assert!(h.store.list().is_empty());
    }

    #[tokio::test]
    async fn test_save_while_tracking_is_rejected() {
        let h = harness(1 << 20);
        h.tracker.start().await.unwrap();
        push_and_wait(&h, 52.0, 19.0).await;
        assert!(matches!(
            h.tracker.save().await,
            Err(TrackingError::StillTracking)
        ));
    }

    #[tokio::test]
    async fn test_capture_photo_requires_camera() {
        let h = harness(1 << 20);
        assert!(matches!(
            h.tracker.capture_photo().await,
            Err(TrackingError::CameraNotAttached)
        ));

        assert!(h.tracker.attach_camera().await.unwrap());
        assert!(!h.tracker.attach_camera().await.unwrap());
        assert_eq!(h.camera.open_streams(), 1);

        h.camera
            .push_frame(Frame::from_encoded(vec![0xFF, 0xD8, 0xFF, 0xDB]).unwrap())
            .unwrap();
        let photo = h.tracker.capture_photo().await.unwrap();
        assert!(photo.image_data.starts_with("data:image/jpeg;base64,"));
        assert_eq!(photo.lat, None);

        assert!(h.tracker.detach_camera().await);
        assert_eq!(h.camera.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_save_releases_camera_even_on_failure() {
        let h = harness(1 << 20);
        h.tracker.attach_camera().await.unwrap();

        // No samples: save fails, camera is still released.
        assert!(matches!(
            h.tracker.save().await,
            Err(TrackingError::NoSamples)
        ));
        assert_eq!(h.camera.open_streams(), 0);
        assert!(!h.tracker.camera_attached().await);
    }

    #[tokio::test]
    async fn test_location_errors_become_toasts() {
        let h = harness(1 << 20);
        let mut toasts = h.view.subscribe_toasts();
        h.tracker.start().await.unwrap();

        h.location
            .push_error(crate::services::location::LocationError::PermissionDenied);
        let toast = tokio::time::timeout(Duration::from_secs(2), toasts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(toast.message, "Location permission denied");
        assert_eq!(h.tracker.state().await, TrackingState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fix_times_out_once_per_silence() {
        let h = harness(1 << 20);
        let fix_timeout = WatchOptions::default().timeout;
        let mut toasts = h.view.subscribe_toasts();
        let started = Instant::now();
        h.tracker.start().await.unwrap();

        let toast = tokio::time::timeout(fix_timeout * 2, toasts.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() >= fix_timeout);
        assert_eq!(toast.message, TrackingError::LocationTimeout.to_string());

        // Continued silence is not reported again
        tokio::time::sleep(fix_timeout * 3).await;
        assert!(toasts.try_recv().is_err());

        push_and_wait(&h, 52.0, 19.0).await;
        let fixed = Instant::now();
        let toast = tokio::time::timeout(fix_timeout * 2, toasts.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(fixed.elapsed() >= fix_timeout - Duration::from_millis(10));
        assert_eq!(toast.message, TrackingError::LocationTimeout.to_string());
        assert_eq!(h.tracker.state().await, TrackingState::Active);
    }
}
