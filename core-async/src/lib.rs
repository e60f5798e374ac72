//! Async runtime facade for the media VFS workspace.
//!
//! All core-* and bridge-* crates depend on this crate instead of naming
//! tokio directly, so the executor choice stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and blocking offload
//! - `time`: Sleep, timeouts, durations
//! - `sync`: Async channels plus the cancellation token used by fetch jobs
//! - `runtime`: Runtime handles and a `block_on` helper for sync callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example(token: CancellationToken) {
//!     core_async::select! {
//!         biased;
//!         _ = token.cancelled() => {}
//!         _ = sleep(Duration::from_millis(10)) => {}
//!     }
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use futures::stream::{BoxStream, StreamExt};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use tokio::select;
