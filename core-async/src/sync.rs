//! Synchronization primitives.
//!
//! Async-aware channels and locks come from `tokio::sync`. Cooperative
//! cancellation uses `tokio_util`'s [`CancellationToken`], which fetch jobs
//! race against their stream reads and retry delays.

pub use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, Notify, RwLock};
pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
