//! Device-local key/value storage.

pub mod local_storage;

pub use local_storage::{LocalStorage, StorageError};

/// Storage keys as constants.
pub mod keys {
    /// Versioned payload holding every saved hike.
    pub const HIKES: &str = "hikes";
}

/// Default storage quota, matching the usual browser local-storage limit.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
