//! Reference-counted handle registry.
//!
//! Every consumer of a remote file goes through [`AccessRegistry::acquire`]
//! and [`AccessRegistry::release`]. Consumers of the same key share one
//! [`RemoteRandomAccessFile`]; the handle is closed when the last consumer
//! releases it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::CacheRecordStore;
use core_async::runtime::Handle;
use core_runtime::logging::short_key;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::FetchConfig;
use crate::error::Result;
use crate::proxy::ProxyAdapter;
use crate::remote_file::RemoteRandomAccessFile;
use crate::source::FileSource;

struct Entry {
    handle: RemoteRandomAccessFile,
    refcount: usize,
}

/// Maps document keys to shared open handles.
pub struct AccessRegistry {
    cache_dir: PathBuf,
    config: FetchConfig,
    store: Arc<dyn CacheRecordStore>,
    runtime: Handle,
    entries: Mutex<HashMap<String, Entry>>,
    closed_count: AtomicU64,
}

impl std::fmt::Debug for AccessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessRegistry")
            .field("cache_dir", &self.cache_dir)
            .field("open_handles", &self.entries.lock().len())
            .field("closed_count", &self.closed_count())
            .finish()
    }
}

impl AccessRegistry {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        config: FetchConfig,
        store: Arc<dyn CacheRecordStore>,
        runtime: Handle,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            config,
            store,
            runtime,
            entries: Mutex::new(HashMap::new()),
            closed_count: AtomicU64::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the shared handle for `key`, opening it on first use.
    ///
    /// `source` is only consulted when the handle is opened; later callers
    /// share the existing handle's source.
    #[instrument(level = "debug", skip(self, source), fields(key = %short_key(key)))]
    pub fn acquire(&self, key: &str, source: FileSource) -> Result<RemoteRandomAccessFile> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(key) {
            entry.refcount += 1;
            debug!(key = %short_key(key), refcount = entry.refcount, "Reusing open handle");
            return Ok(entry.handle.clone());
        }

        let handle = RemoteRandomAccessFile::open(
            key,
            source,
            self.config.clone(),
            Arc::clone(&self.store),
            &self.cache_dir,
            self.runtime.clone(),
        )?;

        entries.insert(
            key.to_string(),
            Entry {
                handle: handle.clone(),
                refcount: 1,
            },
        );
        debug!(key = %short_key(key), open_handles = entries.len(), "Opened new handle");
        Ok(handle)
    }

    /// Drops one reference to `key`, closing the handle on the last one.
    ///
    /// Returns false if `key` has no open handle.
    #[instrument(level = "debug", skip(self), fields(key = %short_key(key)))]
    pub fn release(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(key) else {
            warn!(key = %short_key(key), "Release of a key with no open handle");
            return false;
        };

        entry.refcount -= 1;
        if entry.refcount > 0 {
            debug!(key = %short_key(key), refcount = entry.refcount, "Released reference");
            return true;
        }

        if let Some(entry) = entries.remove(key) {
            entry.handle.close();
            self.closed_count.fetch_add(1, Ordering::Relaxed);
            debug!(key = %short_key(key), open_handles = entries.len(), "Closed last reference");
        }
        true
    }

    /// Current number of references to `key`, 0 if not open.
    pub fn refcount(&self, key: &str) -> usize {
        self.entries.lock().get(key).map_or(0, |entry| entry.refcount)
    }

    /// Keys with open handles and their reference counts, sorted by key.
    pub fn open_handles(&self) -> Vec<(String, usize)> {
        let mut handles: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.refcount))
            .collect();
        handles.sort();
        handles
    }

    /// Number of handles closed by a final release or by [`Self::close_all`].
    pub fn closed_count(&self) -> u64 {
        self.closed_count.load(Ordering::Relaxed)
    }

    /// Closes every open handle regardless of reference counts.
    /// Returns the number of handles closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();

        for entry in &drained {
            entry.handle.close();
        }
        self.closed_count
            .fetch_add(drained.len() as u64, Ordering::Relaxed);

        if !drained.is_empty() {
            info!(closed = drained.len(), "Closed all open handles");
        }
        drained.len()
    }

    /// Acquires `key` and wraps it in a [`ProxyAdapter`] that releases the
    /// reference when the host is done with it.
    pub fn proxy(self: &Arc<Self>, key: &str, source: FileSource) -> Result<ProxyAdapter> {
        let handle = self.acquire(key, source)?;
        Ok(ProxyAdapter::new(key, handle, Arc::clone(self)))
    }
}
