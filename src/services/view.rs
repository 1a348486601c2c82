// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! View model: the store and the tracking session publish here, renderers
//! subscribe.
//!
//! Readouts and history are "latest value" channels; toasts are broadcast
//! so every open screen sees each notification once.

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::models::{HikeRecord, HikeSummary, Readout};

const TOAST_CAPACITY: usize = 32;

/// Kind of a transient user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Info,
    Error,
}

/// Transient notification shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }
}

/// History list as rendered: most recent hike first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryView {
    pub hikes: Vec<HikeRecord>,
    pub summary: HikeSummary,
}

impl HistoryView {
    /// Build the view from the stored order (most-recent-last).
    pub fn from_stored(hikes: &[HikeRecord]) -> Self {
        Self {
            hikes: hikes.iter().rev().cloned().collect(),
            summary: HikeSummary::from_hikes(hikes),
        }
    }
}

/// Publisher handles shared by the store, the tracker and the routes.
#[derive(Clone)]
pub struct ViewModel {
    readout: watch::Sender<Readout>,
    route: watch::Sender<Vec<(f64, f64)>>,
    history: watch::Sender<HistoryView>,
    toasts: broadcast::Sender<Toast>,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewModel {
    pub fn new() -> Self {
        let (readout, _) = watch::channel(Readout::default());
        let (route, _) = watch::channel(Vec::new());
        let (history, _) = watch::channel(HistoryView::default());
        let (toasts, _) = broadcast::channel(TOAST_CAPACITY);
        Self {
            readout,
            route,
            history,
            toasts,
        }
    }

    pub fn publish_readout(&self, readout: Readout) {
        self.readout.send_replace(readout);
    }

    /// Publish the live route as `(lng, lat)` pairs.
    pub fn publish_route(&self, route: Vec<(f64, f64)>) {
        self.route.send_replace(route);
    }

    pub fn publish_history(&self, history: HistoryView) {
        self.history.send_replace(history);
    }

    pub fn toast(&self, toast: Toast) {
        tracing::debug!(kind = ?toast.kind, message = %toast.message, "Toast");
        // No subscribers is fine: nobody is looking at a screen.
        let _ = self.toasts.send(toast);
    }

    pub fn readout(&self) -> Readout {
        self.readout.borrow().clone()
    }

    pub fn route(&self) -> Vec<(f64, f64)> {
        self.route.borrow().clone()
    }

    pub fn history(&self) -> HistoryView {
        self.history.borrow().clone()
    }

    pub fn subscribe_readout(&self) -> watch::Receiver<Readout> {
        self.readout.subscribe()
    }

    pub fn subscribe_route(&self) -> watch::Receiver<Vec<(f64, f64)>> {
        self.route.subscribe()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<HistoryView> {
        self.history.subscribe()
    }

    pub fn subscribe_toasts(&self) -> broadcast::Receiver<Toast> {
        self.toasts.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readout_subscribers_see_latest_value() {
        let view = ViewModel::new();
        let mut rx = view.subscribe_readout();

        let readout = Readout {
            tracking: true,
            ..Readout::default()
        };
        view.publish_readout(readout.clone());

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), readout);
        assert_eq!(view.readout(), readout);
    }

    #[tokio::test]
    async fn test_toasts_are_broadcast() {
        let view = ViewModel::new();
        let mut a = view.subscribe_toasts();
        let mut b = view.subscribe_toasts();

        view.toast(Toast::error("Location timed out"));

        assert_eq!(a.recv().await.unwrap().message, "Location timed out");
        assert_eq!(b.recv().await.unwrap().kind, ToastKind::Error);
    }

    #[tokio::test]
    async fn test_route_and_history_subscribers() {
        let view = ViewModel::new();
        let mut route = view.subscribe_route();
        let mut history = view.subscribe_history();

        view.publish_route(vec![(19.0, 52.0), (19.0, 52.001)]);
        view.publish_history(HistoryView::default());

        route.changed().await.unwrap();
        assert_eq!(route.borrow_and_update().len(), 2);
        history.changed().await.unwrap();
        assert_eq!(history.borrow_and_update().summary.count, 0);
    }

    #[test]
    fn test_toast_without_subscribers_is_dropped() {
        let view = ViewModel::new();
        view.toast(Toast::info("nobody listening"));
    }
}
