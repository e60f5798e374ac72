//! Task spawning, including spawning onto an explicit runtime handle.
//!
//! Fetch jobs are started from synchronous reader threads, so they go
//! through [`spawn_on`] rather than relying on an ambient runtime.

use std::future::Future;

use tokio::runtime::Handle;

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a future onto the runtime the caller is running on.
///
/// Panics outside a runtime, like [`tokio::spawn`].
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawns a future onto `handle`. Safe to call from threads that are not
/// part of any runtime.
pub fn spawn_on<F>(handle: &Handle, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    handle.spawn(future)
}

/// Waits for `task`, mapping a cancelled task to `None`.
///
/// Panics inside the task are surfaced as `Err`.
pub async fn join_settled<T>(task: JoinHandle<T>) -> Result<Option<T>> {
    match task.await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_cancelled() => Ok(None),
        Err(e) => Err(e),
    }
}

pub type Result<T> = std::result::Result<T, JoinError>;
