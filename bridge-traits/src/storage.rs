//! Cache Record Persistence
//!
//! Abstracts where per-file cache metadata lives between process runs:
//! - Desktop: one JSON document per key on disk
//! - Mobile: the host's database of choice
//! - Tests: an in-memory map
//!
//! Only the fields needed to resume a partially downloaded file are stored.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serializable form of a cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCacheRecord {
    /// Path of the local cache file
    pub local_path: String,

    /// Total length of the remote file, once known
    pub local_length: Option<u64>,

    /// Whether the whole file has been downloaded
    pub completed: bool,

    /// Cached spans in `start,end;start,end` form
    pub chunks: String,

    /// Last negotiated bitrate in bits per second
    #[serde(default)]
    pub bitrate: Option<u64>,

    /// Unix timestamp of the last save
    #[serde(default)]
    pub updated_at: i64,
}

/// Key-value persistence for cache records.
///
/// Calls are synchronous: they are made from blocking reader threads and
/// from the tail of fetch jobs, and each touches a single small record.
#[cfg_attr(test, mockall::automock)]
pub trait CacheRecordStore: Send + Sync {
    /// Load the record stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<StoredCacheRecord>>;

    /// Insert or replace the record stored under `key`.
    fn save(&self, key: &str, record: &StoredCacheRecord) -> Result<()>;

    /// Delete the record stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Maps a record key to a portable file name.
///
/// Distinct keys always map to distinct names, including on
/// case-insensitive filesystems. Lowercase ASCII letters, digits, `_` and
/// `-` are kept. A `.` is kept except in first position. Every other byte
/// of the UTF-8 key becomes `%XX` with uppercase hex digits. The empty key
/// maps to `%`, which no other key produces.
// TODO: hash keys whose escaped name would exceed the 255-byte NAME_MAX.
pub fn file_name_for_key(key: &str) -> String {
    if key.is_empty() {
        return "%".to_string();
    }

    let mut name = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let keep = byte.is_ascii_lowercase()
            || byte.is_ascii_digit()
            || matches!(byte, b'_' | b'-')
            || (byte == b'.' && i > 0);
        if keep {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name
}
