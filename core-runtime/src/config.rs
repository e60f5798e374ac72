//! # VFS Configuration Module
//!
//! Provides configuration management for the media VFS core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `VfsConfig`
//! instance that holds the host-provided bridges and settings shared by every
//! cached file. It enforces fail-fast validation so a missing capability is
//! reported at startup instead of on the first read.
//!
//! ## Required Dependencies
//!
//! - `cache_dir` - Directory holding one cache file per document key
//! - `CacheRecordStore` - Persists chunk metadata between runs (desktop default:
//!   JSON files under `<cache_dir>/records`)
//!
//! ## Optional Dependencies
//!
//! - `Handle` - Runtime the background fetch jobs are spawned on. When omitted
//!   the service uses the runtime it is constructed on.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::VfsConfig;
//! use std::sync::Arc;
//!
//! let config = VfsConfig::builder()
//!     .cache_dir("/data/user/0/app/cache/media")
//!     .record_store(Arc::new(MyRecordStore::new()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::CacheRecordStore;
use core_async::runtime::Handle;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration shared by every cached remote file.
#[derive(Clone)]
pub struct VfsConfig {
    /// Directory for cache files, one per document key
    pub cache_dir: PathBuf,

    /// Persistence for per-file cache records
    pub record_store: Arc<dyn CacheRecordStore>,

    /// Runtime used to spawn fetch jobs
    pub runtime: Option<Handle>,
}

impl std::fmt::Debug for VfsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VfsConfig")
            .field("cache_dir", &self.cache_dir)
            .field("record_store", &"CacheRecordStore { ... }")
            .field("runtime", &self.runtime.as_ref().map(|_| "Handle { ... }"))
            .finish()
    }
}

impl VfsConfig {
    /// Creates a new builder for constructing a `VfsConfig`.
    pub fn builder() -> VfsConfigBuilder {
        VfsConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.cache_dir.is_file() {
            return Err(Error::Config(format!(
                "Cache directory {} is an existing file",
                self.cache_dir.display()
            )));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn record_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "CacheRecordStore".to_string(),
        message: "CacheRecordStore implementation is required to persist cached chunk metadata. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default JsonFileRecordStore. \
                 Mobile: inject a store backed by the host database."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_record_store(cache_dir: &std::path::Path) -> Result<Arc<dyn CacheRecordStore>> {
    use bridge_desktop::JsonFileRecordStore;

    let store = JsonFileRecordStore::new(cache_dir.join("records")).map_err(|source| {
        Error::DefaultProvider {
            capability: "CacheRecordStore",
            source,
        }
    })?;
    let store: Arc<dyn CacheRecordStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_record_store(_cache_dir: &std::path::Path) -> Result<Arc<dyn CacheRecordStore>> {
    Err(record_store_missing_error())
}

/// Builder for constructing [`VfsConfig`] instances.
#[derive(Default)]
pub struct VfsConfigBuilder {
    cache_dir: Option<PathBuf>,
    record_store: Option<Arc<dyn CacheRecordStore>>,
    runtime: Option<Handle>,
}

impl VfsConfigBuilder {
    /// Sets the cache directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::VfsConfig;
    ///
    /// let builder = VfsConfig::builder()
    ///     .cache_dir("/path/to/cache");
    /// ```
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the cache record store implementation.
    ///
    /// If not provided, the desktop default (JSON files) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn record_store(mut self, store: Arc<dyn CacheRecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    /// Sets the runtime that fetch jobs are spawned on.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the cache directory is missing or invalid
    /// - `Error::CapabilityMissing` if no record store was provided and no
    ///   platform default is available
    pub fn build(self) -> Result<VfsConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Call cache_dir() on the builder.".to_string())
        })?;

        let record_store = match self.record_store {
            Some(store) => store,
            None => provide_default_record_store(&cache_dir)?,
        };

        let config = VfsConfig {
            cache_dir,
            record_store,
            runtime: self.runtime,
        };

        config.validate()?;
        Ok(config)
    }
}
