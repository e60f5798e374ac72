//! Fetch tuning and policies

use std::time::Duration;

/// Tuning for background fetches and blocked readers.
///
/// These are policy knobs, not structure: defaults match a typical audio
/// stream over a home-server connection.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Bytes accumulated before a span is committed and readers are woken
    /// (default: 128 KiB)
    pub flush_threshold: u64,

    /// Largest slice written to the cache file in one call (default: 8 KiB)
    pub transfer_buffer_size: usize,

    /// Additional attempts after a transient fetch error (default: 3)
    pub max_retries: u32,

    /// Fixed delay between attempts (default: 1s)
    pub retry_delay: Duration,

    /// Upper bound on how long a reader sleeps between re-checks
    /// (default: 500ms)
    pub poll_interval: Duration,

    /// Start fetching the first missing span as soon as a handle opens
    /// (default: true)
    pub prefetch_on_open: bool,

    /// Requests landing this far ahead of a running fetch's cursor are left
    /// to that fetch instead of superseding it (default: 128 KiB, 0 disables)
    pub overlap_window: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 128 * 1024,
            transfer_buffer_size: 8 * 1024,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
            prefetch_on_open: true,
            overlap_window: 128 * 1024,
        }
    }
}

impl FetchConfig {
    /// Create a new fetch configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the commit threshold in bytes.
    pub fn with_flush_threshold(mut self, bytes: u64) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Set the transfer buffer size in bytes.
    pub fn with_transfer_buffer_size(mut self, bytes: usize) -> Self {
        self.transfer_buffer_size = bytes;
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the reader re-check interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable fetching on open.
    pub fn with_prefetch_on_open(mut self, enabled: bool) -> Self {
        self.prefetch_on_open = enabled;
        self
    }

    /// Set the look-ahead window for overlapping requests.
    pub fn with_overlap_window(mut self, bytes: u64) -> Self {
        self.overlap_window = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.flush_threshold == 0 {
            return Err("flush_threshold must be greater than 0".to_string());
        }

        if self.transfer_buffer_size < 512 {
            return Err("transfer_buffer_size must be at least 512 bytes".to_string());
        }

        if self.transfer_buffer_size as u64 > self.flush_threshold {
            return Err("transfer_buffer_size cannot exceed flush_threshold".to_string());
        }

        if self.max_retries > 100 {
            return Err("max_retries cannot exceed 100".to_string());
        }

        if self.poll_interval < Duration::from_millis(10) || self.poll_interval > Duration::from_secs(60) {
            return Err("poll_interval must be between 10ms and 60s".to_string());
        }

        Ok(())
    }
}
