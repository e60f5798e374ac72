//! Adapter from an OS file-proxy callback to a registry handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::ProxyFileCallback;
use core_runtime::logging::short_key;
use tracing::{debug, error, warn};

use crate::registry::AccessRegistry;
use crate::remote_file::RemoteRandomAccessFile;

/// One opened proxy descriptor.
///
/// Holds a registry reference for its lifetime. The reference is released
/// on the first [`ProxyAdapter::on_release`] or on drop, whichever comes
/// first.
pub struct ProxyAdapter {
    key: String,
    handle: RemoteRandomAccessFile,
    registry: Arc<AccessRegistry>,
    released: AtomicBool,
}

impl std::fmt::Debug for ProxyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyAdapter")
            .field("key", &self.key)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}

impl ProxyAdapter {
    pub(crate) fn new(key: &str, handle: RemoteRandomAccessFile, registry: Arc<AccessRegistry>) -> Self {
        Self {
            key: key.to_string(),
            handle,
            registry,
            released: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handle(&self) -> &RemoteRandomAccessFile {
        &self.handle
    }

    pub fn size(&self) -> u64 {
        self.handle.length()
    }

    /// Blocking read. Errors are logged and reported as 0 bytes.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let size = buf.len();
        match self.handle.read(offset, buf) {
            Ok(read) => {
                if read != size {
                    let total = self.handle.length();
                    warn!(
                        key = %short_key(&self.key),
                        offset,
                        size,
                        read,
                        total,
                        eof = offset.saturating_add(read as u64) >= total,
                        "Short proxy read"
                    );
                }
                read
            }
            Err(e) => {
                warn!(key = %short_key(&self.key), offset, size, error = %e, "Proxy read failed");
                0
            }
        }
    }

    /// Releases the registry reference. Later calls do nothing.
    pub fn on_release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(key = %short_key(&self.key), "Proxy released");
        self.registry.release(&self.key);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl ProxyFileCallback for ProxyAdapter {
    fn on_get_size(&self) -> i64 {
        i64::try_from(self.size()).unwrap_or(i64::MAX)
    }

    fn on_read(&self, offset: i64, buf: &mut [u8]) -> i32 {
        let Ok(offset) = u64::try_from(offset) else {
            error!(key = %short_key(&self.key), offset, "Negative proxy read offset");
            return 0;
        };

        // Keep the byte count representable in the return type.
        let len = buf.len().min(i32::MAX as usize);
        let read = self.read_at(offset, &mut buf[..len]);
        i32::try_from(read).unwrap_or(i32::MAX)
    }

    fn on_release(&self) {
        ProxyAdapter::on_release(self);
    }
}

impl Drop for ProxyAdapter {
    fn drop(&mut self) {
        self.on_release();
    }
}
