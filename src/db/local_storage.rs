// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synchronous, size-limited key/value storage.
//!
//! Each key is persisted as one file in the data directory. Values are kept
//! in memory as well, so reads never touch the disk after startup. The quota
//! counts the bytes of every key and value currently stored.

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FILE_EXTENSION: &str = "json";

/// Key/value storage handle. Cheap to clone.
#[derive(Clone)]
pub struct LocalStorage {
    inner: Arc<Inner>,
}

struct Inner {
    dir: Option<PathBuf>,
    quota_bytes: usize,
    entries: DashMap<String, String>,
}

impl LocalStorage {
    /// Open storage backed by `dir`, loading every existing key.
    ///
    /// Files that cannot be read are skipped with a warning; they are treated
    /// as absent keys rather than a startup failure.
    pub fn open<P: AsRef<Path>>(dir: P, quota_bytes: usize) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Io(e.to_string()))?;

        let entries = DashMap::new();
        let listing = fs::read_dir(&dir).map_err(|e| StorageError::Io(e.to_string()))?;
        for entry in listing.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(value) => {
                    entries.insert(key.to_string(), value);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable storage file");
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            keys = entries.len(),
            quota_bytes,
            "Local storage opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dir: Some(dir),
                quota_bytes,
                entries,
            }),
        })
    }

    /// Create storage that lives only in memory (tests, ephemeral runs).
    pub fn in_memory(quota_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir: None,
                quota_bytes,
                entries: DashMap::new(),
            }),
        }
    }

    /// Read a value. Absent keys return `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.get(key).map(|v| v.value().clone())
    }

    /// Write a value, replacing any previous one.
    ///
    /// Fails with [`StorageError::QuotaExceeded`] when the write would push
    /// the total size past the quota; the previous value stays in place.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let needed = self.used_bytes_excluding(key) + key.len() + value.len();
        if needed > self.inner.quota_bytes {
            tracing::warn!(
                key,
                needed,
                quota = self.inner.quota_bytes,
                "Storage quota exceeded"
            );
            return Err(StorageError::QuotaExceeded {
                needed,
                quota: self.inner.quota_bytes,
            });
        }

        if let Some(dir) = &self.inner.dir {
            write_atomic(&file_path(dir, key), value)?;
        }
        self.inner
            .entries
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        if let Some(dir) = &self.inner.dir {
            match fs::remove_file(file_path(dir, key)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e.to_string())),
            }
        }
        self.inner.entries.remove(key);
        Ok(())
    }

    /// Total bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes_excluding("")
    }

    pub fn quota_bytes(&self) -> usize {
        self.inner.quota_bytes
    }

    fn used_bytes_excluding(&self, skip: &str) -> usize {
        self.inner
            .entries
            .iter()
            .filter(|e| e.key() != skip)
            .map(|e| e.key().len() + e.value().len())
            .sum()
    }
}

fn file_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", key, FILE_EXTENSION))
}

/// Write through a temporary file so a crash never leaves a torn value.
fn write_atomic(path: &Path, value: &str) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, value).map_err(|e| StorageError::Io(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::Io(e.to_string()))
}

/// Errors from local storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage I/O error: {0}")]
    Io(String),
}
