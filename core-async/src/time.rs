//! Time and timer abstractions.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

/// Error returned by [`timeout`] when the deadline elapses.
pub use tokio::time::error::Elapsed;
