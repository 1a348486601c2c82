// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted hike store.
//!
//! All hikes live under a single storage key as one versioned JSON payload.
//! Every operation is a read-modify-write of that payload with linear scans;
//! there is no index. Reads never fail: absent or malformed data reads as an
//! empty store.

use std::sync::Mutex;

use crate::db::{keys, LocalStorage, StorageError};
use crate::models::{HikeArchive, HikeRecord, HikeSummary};
use crate::services::view::{HistoryView, ViewModel};

/// Append-only store of saved hikes.
pub struct HikeStore {
    storage: LocalStorage,
    view: ViewModel,
    // Serializes read-modify-write cycles within this process. Writers in
    // other processes still race on the key (last write wins).
    write_lock: Mutex<()>,
}

impl HikeStore {
    pub fn new(storage: LocalStorage, view: ViewModel) -> Self {
        let store = Self {
            storage,
            view,
            write_lock: Mutex::new(()),
        };
        store.publish();
        store
    }

    /// All hikes, oldest first.
    pub fn list(&self) -> Vec<HikeRecord> {
        self.read_archive().hikes
    }

    /// Find a hike by id.
    pub fn get(&self, id: u64) -> Option<HikeRecord> {
        self.list().into_iter().find(|h| h.id == id)
    }

    /// Count and distance totals, recomputed from the stored list.
    pub fn aggregate(&self) -> HikeSummary {
        HikeSummary::from_hikes(&self.list())
    }

    /// Allocate an id derived from the creation time.
    ///
    /// Uses `now_millis` unless that would collide with an existing id, in
    /// which case the next value above the largest id is used.
    pub fn next_id(&self, now_millis: u64) -> u64 {
        let hikes = self.list();
        if hikes.iter().all(|h| h.id != now_millis) {
            return now_millis;
        }
        hikes.iter().map(|h| h.id).max().unwrap_or(0) + 1
    }

    /// Append a record to the end of the store.
    ///
    /// On failure nothing is written; the caller still owns `record` and may
    /// retry.
    pub fn append(&self, record: &HikeRecord) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut archive = self.read_archive();
        if archive.hikes.iter().any(|h| h.id == record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        archive.hikes.push(record.clone());
        self.write_archive(&archive)?;

        tracing::info!(
            hike_id = record.id,
            distance_km = record.distance_km,
            samples = record.positions.len(),
            photos = record.photos.len(),
            "Hike saved"
        );
        self.view.publish_history(HistoryView::from_stored(&archive.hikes));
        Ok(())
    }

    /// Delete the hike with `id`. Returns whether a record was removed;
    /// deleting an absent id is a no-op.
    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock();
        let mut archive = self.read_archive();
        let before = archive.hikes.len();
        archive.hikes.retain(|h| h.id != id);
        if archive.hikes.len() == before {
            tracing::debug!(hike_id = id, "Delete of unknown hike ignored");
            return Ok(false);
        }
        self.write_archive(&archive)?;

        tracing::info!(hike_id = id, "Hike deleted");
        self.view.publish_history(HistoryView::from_stored(&archive.hikes));
        Ok(true)
    }

    /// Re-publish the history view from storage.
    pub fn publish(&self) {
        self.view
            .publish_history(HistoryView::from_stored(&self.list()));
    }

    fn read_archive(&self) -> HikeArchive {
        let Some(raw) = self.storage.get(keys::HIKES) else {
            return HikeArchive::default();
        };
        match HikeArchive::decode(&raw) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::warn!(error = %e, "Stored hikes unreadable, treating as empty");
                HikeArchive::default()
            }
        }
    }

    fn write_archive(&self, archive: &HikeArchive) -> Result<(), StoreError> {
        let encoded = archive
            .encode()
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        self.storage
            .set(keys::HIKES, &encoded)
            .map_err(StoreError::from)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Errors from hike store writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage quota exceeded")]
    StorageQuotaExceeded,

    #[error("Hike {0} already exists")]
    DuplicateId(u64),

    #[error("Failed to encode hikes: {0}")]
    Encode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded { .. } => StoreError::StorageQuotaExceeded,
            StorageError::Io(msg) => StoreError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;

    fn make_store(quota: usize) -> (HikeStore, LocalStorage, ViewModel) {
        let storage = LocalStorage::in_memory(quota);
        let view = ViewModel::new();
        (HikeStore::new(storage.clone(), view.clone()), storage, view)
    }

    fn make_hike(id: u64, distance_km: f64) -> HikeRecord {
        HikeRecord {
            id,
            date: "2024-06-01 09:00:00 UTC".to_string(),
            duration_display: "01:00:00".to_string(),
            distance_km,
            positions: vec![
                Position {
                    lat: 52.0,
                    lng: 19.0,
                    alt: Some(120.0),
                },
                Position {
                    lat: 52.01,
                    lng: 19.0,
                    alt: None,
                },
            ],
            photos: vec![],
        }
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let (store, _, _) = make_store(4096);
        assert!(store.list().is_empty());
        assert_eq!(store.aggregate().count, 0);
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let (store, _, _) = make_store(4096);
        store.append(&make_hike(1, 1.0)).unwrap();
        store.append(&make_hike(2, 2.0)).unwrap();

        let ids: Vec<u64> = store.list().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.get(2).unwrap().distance_km, 2.0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (store, _, _) = make_store(4096);
        store.append(&make_hike(1, 1.0)).unwrap();
        assert!(matches!(
            store.append(&make_hike(1, 3.0)),
            Err(StoreError::DuplicateId(1))
        ));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_delete_and_delete_missing() {
        let (store, _, _) = make_store(4096);
        store.append(&make_hike(1, 1.0)).unwrap();
        store.append(&make_hike(2, 2.0)).unwrap();

        assert!(store.delete(1).unwrap());
        assert!(!store.delete(1).unwrap());
        assert!(!store.delete(42).unwrap());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_aggregate_matches_list() {
        let (store, _, _) = make_store(4096);
        store.append(&make_hike(1, 1.25)).unwrap();
        store.append(&make_hike(2, 2.5)).unwrap();

        let summary = store.aggregate();
        let hikes = store.list();
        assert_eq!(summary.count as usize, hikes.len());
        let sum: f64 = hikes.iter().map(|h| h.distance_km).sum();
        assert!((summary.total_distance_km - sum).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_payload_reads_as_empty() {
        let (store, storage, _) = make_store(4096);
        storage.set(keys::HIKES, "{ not json").unwrap();
        assert!(store.list().is_empty());

        // A write replaces the corrupt payload with a valid one.
        store.append(&make_hike(7, 1.0)).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_legacy_array_is_migrated_on_write() {
        let (store, storage, _) = make_store(4096);
        storage
            .set(
                keys::HIKES,
                r#"[{"id":3,"date":"d","durationDisplay":"00:01:00","distanceKm":0.5,"positions":[]}]"#,
            )
            .unwrap();

        store.append(&make_hike(4, 1.0)).unwrap();
        let raw = storage.get(keys::HIKES).unwrap();
        assert!(raw.starts_with(r#"{"version":1"#));
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_quota_exceeded_leaves_store_untouched() {
        let (store, _, _) = make_store(300);
        store.append(&make_hike(1, 1.0)).unwrap();

        let err = store.append(&make_hike(2, 1.0)).unwrap_err();
        assert!(matches!(err, StoreError::StorageQuotaExceeded));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_next_id_avoids_collisions() {
        let (store, _, _) = make_store(4096);
        assert_eq!(store.next_id(1000), 1000);

        store.append(&make_hike(1000, 1.0)).unwrap();
        store.append(&make_hike(1005, 1.0)).unwrap();
        assert_eq!(store.next_id(1000), 1006);
        assert_eq!(store.next_id(2000), 2000);
    }

    #[test]
    fn test_writes_publish_history_most_recent_first() {
        let (store, _, view) = make_store(4096);
        store.append(&make_hike(1, 1.0)).unwrap();
        store.append(&make_hike(2, 2.0)).unwrap();

        let history = view.history();
        assert_eq!(history.hikes[0].id, 2);
        assert_eq!(history.summary.count, 2);

        store.delete(2).unwrap();
        assert_eq!(view.history().hikes.len(), 1);
    }
}
