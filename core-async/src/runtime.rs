//! Runtime utilities that abstract over the underlying async executor.
//!
//! Fetch jobs are spawned on an explicit [`Handle`] so that synchronous
//! callers (proxy threads, blocking readers) never need an ambient runtime.

use std::io;

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns the handle of the runtime the caller is running on, if any.
pub fn current_handle() -> Option<Handle> {
    Handle::try_current().ok()
}

/// Builds a multi-threaded runtime dedicated to background fetches.
pub fn background_runtime(worker_threads: usize, name: &str) -> io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name(name)
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_returns_output() {
        let value = block_on(async { 21 * 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_current_handle_outside_runtime() {
        assert!(current_handle().is_none());
    }

    #[test]
    fn test_background_runtime_spawns() {
        let runtime = background_runtime(1, "test-fetch").unwrap();
        let handle = runtime.handle().clone();
        let value = runtime.block_on(async move { handle.spawn(async { 7 }).await.unwrap() });
        assert_eq!(value, 7);
    }
}
