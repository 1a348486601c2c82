// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Camera streams and frame snapshots.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::services::tracking::TrackingError;

/// An encoded video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl Frame {
    /// Wrap already-encoded image bytes, detecting JPEG or PNG.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, TrackingError> {
        let mime = sniff_image_mime(&bytes).ok_or(TrackingError::InvalidFrame)?;
        Ok(Self { mime, bytes })
    }

    /// Encode the frame as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else {
        None
    }
}

/// An open camera stream. Dropping it releases the camera.
pub struct CameraStream {
    frames: watch::Receiver<Option<Arc<Frame>>>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CameraStream {
    pub fn new(
        frames: watch::Receiver<Option<Arc<Frame>>>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            frames,
            release: Some(Box::new(release)),
        }
    }

    /// Snapshot the current frame as a `data:` URL.
    pub fn snapshot(&self) -> Result<String, TrackingError> {
        let frame = self.frames.borrow();
        frame
            .as_ref()
            .map(|f| f.to_data_url())
            .ok_or(TrackingError::NoFrame)
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Something that can open a camera stream.
pub trait CameraSource: Send + Sync {
    /// Acquire the camera. Fails with [`TrackingError::CameraAccessDenied`]
    /// when access is refused.
    fn open(&self) -> Result<CameraStream, TrackingError>;
}

/// Camera whose frames are uploaded by the client.
pub struct UploadedFrameCamera {
    enabled: bool,
    frames: watch::Sender<Option<Arc<Frame>>>,
    open_streams: Arc<AtomicUsize>,
}

impl UploadedFrameCamera {
    pub fn new(enabled: bool) -> Self {
        let (frames, _) = watch::channel(None);
        Self {
            enabled,
            frames,
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the current frame. Requires an open stream.
    pub fn push_frame(&self, frame: Frame) -> Result<(), TrackingError> {
        if self.open_streams() == 0 {
            return Err(TrackingError::CameraNotAttached);
        }
        self.frames.send_replace(Some(Arc::new(frame)));
        Ok(())
    }

    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

impl CameraSource for UploadedFrameCamera {
    fn open(&self) -> Result<CameraStream, TrackingError> {
        if !self.enabled {
            return Err(TrackingError::CameraAccessDenied(
                "camera access is disabled on this device".to_string(),
            ));
        }

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Camera stream opened");

        let open_streams = Arc::clone(&self.open_streams);
        let frames = self.frames.clone();
        Ok(CameraStream::new(self.frames.subscribe(), move || {
            // Last stream gone: the video element goes dark.
            if open_streams.fetch_sub(1, Ordering::SeqCst) == 1 {
                frames.send_replace(None);
            }
            tracing::info!("Camera stream released");
        }))
    }
}
