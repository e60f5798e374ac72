//! Fetch statistics and monitoring

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one remote file handle.
#[derive(Debug, Default)]
pub struct FetchStats {
    fetch_launches: AtomicU64,
    chunk_commits: AtomicU64,
    bytes_fetched: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    superseded: AtomicU64,
    reads_served: AtomicU64,
    reads_waited: AtomicU64,
}

impl FetchStats {
    pub(crate) fn record_launch(&self) {
        self.fetch_launches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, bytes: u64) {
        self.chunk_commits.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, waited: bool) {
        self.reads_served.fetch_add(1, Ordering::Relaxed);
        if waited {
            self.reads_waited.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            fetch_launches: self.fetch_launches.load(Ordering::Relaxed),
            chunk_commits: self.chunk_commits.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            reads_served: self.reads_served.load(Ordering::Relaxed),
            reads_waited: self.reads_waited.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about one handle's fetch activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatsSnapshot {
    /// Background fetch jobs started
    pub fetch_launches: u64,

    /// Spans committed to the chunk set
    pub chunk_commits: u64,

    /// Bytes committed across all fetches
    pub bytes_fetched: u64,

    /// Attempts made after a transient error
    pub retries: u64,

    /// Fetches that gave up
    pub failures: u64,

    /// Fetches cancelled by a newer request
    pub superseded: u64,

    /// Completed `read` calls
    pub reads_served: u64,

    /// Reads that had to wait for fetch progress
    pub reads_waited: u64,
}

impl FetchStatsSnapshot {
    /// Fraction of reads answered without waiting, in `[0, 1]`.
    pub fn hit_ratio(&self) -> f64 {
        if self.reads_served == 0 {
            return 1.0;
        }

        (self.reads_served - self.reads_waited) as f64 / self.reads_served as f64
    }

    /// Average committed span size in bytes.
    pub fn average_commit_size(&self) -> u64 {
        if self.chunk_commits == 0 {
            0
        } else {
            self.bytes_fetched / self.chunk_commits
        }
    }
}
