//! Persisted per-file cache metadata.

use std::path::PathBuf;

use bridge_traits::StoredCacheRecord;
use tracing::warn;

use crate::chunk_set::{ByteRange, ChunkSet};

/// Everything needed to resume serving a remote file after a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Registry key of the remote file
    pub key: String,

    /// Local cache file
    pub local_path: PathBuf,

    /// Total length of the remote file, once a stream reported it
    pub local_length: Option<u64>,

    /// Explicitly marked fully downloaded
    pub completed: bool,

    /// Spans present in the cache file
    pub chunks: ChunkSet,

    /// Last negotiated bitrate in bits per second
    pub bitrate: Option<u64>,
}

impl CacheRecord {
    pub fn new(key: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            local_path: local_path.into(),
            local_length: None,
            completed: false,
            chunks: ChunkSet::new(),
            bitrate: None,
        }
    }

    /// True if marked complete, or if the chunks cover `[0, local_length)`.
    pub fn is_complete(&self) -> bool {
        if self.completed {
            return true;
        }
        match self.local_length {
            Some(0) => true,
            Some(len) => ByteRange::new(0, len - 1)
                .is_some_and(|whole| self.chunks.covers_gap_free(whole)),
            None => false,
        }
    }

    pub fn from_stored(key: impl Into<String>, stored: StoredCacheRecord) -> Self {
        Self {
            key: key.into(),
            local_path: PathBuf::from(stored.local_path),
            local_length: stored.local_length,
            completed: stored.completed,
            chunks: stored.chunks.parse().unwrap_or_default(),
            bitrate: stored.bitrate,
        }
    }

    pub fn to_stored(&self) -> StoredCacheRecord {
        StoredCacheRecord {
            local_path: self.local_path.to_string_lossy().into_owned(),
            local_length: self.local_length,
            completed: self.completed,
            chunks: self.chunks.to_string(),
            bitrate: self.bitrate,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Reconciles the record with the actual size of the cache file.
    ///
    /// The smaller of the file size and the recorded length wins: chunks past
    /// the end of the file are dropped and a completed record whose file is
    /// short loses its completed flag. Returns true if anything changed.
    pub fn reconcile_with_disk(&mut self, on_disk: u64) -> bool {
        let authoritative = self
            .local_length
            .map_or(on_disk, |recorded| recorded.min(on_disk));

        let mut changed = self.chunks.truncate_to(authoritative);

        if self.completed && self.local_length.is_some_and(|len| on_disk < len) {
            self.completed = false;
            changed = true;
        }

        if changed {
            warn!(
                key = %self.key,
                on_disk,
                recorded = ?self.local_length,
                "Cache file disagrees with record, re-fetching remainder"
            );
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: u64, last: u64) -> ByteRange {
        ByteRange::new(first, last).unwrap()
    }

    #[test]
    fn test_complete_by_flag_or_coverage() {
        let mut record = CacheRecord::new("doc-1", "/tmp/doc-1");
        assert!(!record.is_complete());

        record.local_length = Some(1000);
        record.chunks.add(r(0, 998));
        assert!(!record.is_complete());

        record.chunks.add(r(999, 999));
        assert!(record.is_complete());
        assert!(!record.completed);

        let mut flagged = CacheRecord::new("doc-2", "/tmp/doc-2");
        flagged.completed = true;
        assert!(flagged.is_complete());
    }

    #[test]
    fn test_empty_remote_is_complete() {
        let mut record = CacheRecord::new("empty", "/tmp/empty");
        record.local_length = Some(0);
        assert!(record.is_complete());
    }

    #[test]
    fn test_stored_roundtrip() {
        let mut record = CacheRecord::new("doc-1", "/tmp/doc-1");
        record.local_length = Some(40960);
        record.chunks = "0,8191;20000,40959".parse().unwrap();
        record.bitrate = Some(320_000);

        let stored = record.to_stored();
        assert_eq!(stored.chunks, "0,8191;20000,40959");
        assert!(stored.updated_at > 0);

        let restored = CacheRecord::from_stored("doc-1", stored);
        assert_eq!(restored, record);
    }

    #[test]
    fn test_reconcile_short_file_downgrades_completion() {
        let mut record = CacheRecord::new("doc-1", "/tmp/doc-1");
        record.local_length = Some(1000);
        record.completed = true;
        record.chunks.add(r(0, 999));

        assert!(record.reconcile_with_disk(600));
        assert!(!record.completed);
        assert_eq!(record.chunks.ranges(), &[r(0, 599)]);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_reconcile_unknown_length_clamps_to_file() {
        let mut record = CacheRecord::new("doc-1", "/tmp/doc-1");
        record.chunks = "0,4095;8192,12287".parse().unwrap();

        assert!(record.reconcile_with_disk(10_000));
        assert_eq!(record.chunks.to_string(), "0,4095;8192,9999");
    }

    #[test]
    fn test_reconcile_consistent_record_untouched() {
        let mut record = CacheRecord::new("doc-1", "/tmp/doc-1");
        record.local_length = Some(1000);
        record.completed = true;
        record.chunks.add(r(0, 999));

        assert!(!record.reconcile_with_disk(1000));
        assert!(record.completed);
    }
}
