//! # Remote-Backed Random-Access Cache
//!
//! Serves random-access reads over remote files from a sparse local cache
//! file, fetching missing bytes in the background.
//!
//! ## Overview
//!
//! ```text
//!   host descriptor ──► ProxyAdapter ──► AccessRegistry ──► RemoteRandomAccessFile
//!   (size/read/release)                 (key → refcount)        │        │
//!                                                               │        ▼
//!                              cache file ◄── write ── fetch job ◄── RemoteStreamFactory
//!                                   │                      │
//!                              read_at ◄── wait ── ChunkSet commits ──► CacheRecordStore
//! ```
//!
//! - [`ChunkSet`]: sorted, merged set of cached byte ranges
//! - [`CacheRecord`]: what is cached for one key, persisted between runs
//! - [`RemoteRandomAccessFile`]: blocking reads plus one background fetch job
//! - [`AccessRegistry`]: one shared handle per key, closed on last release
//! - [`ProxyAdapter`]: the size/read/release surface of an OS file proxy
//!
//! ## Usage
//!
//! ```ignore
//! use core_cache::{AccessRegistry, FetchConfig, FileSource, InMemoryRecordStore};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(AccessRegistry::new(
//!     "/data/cache/media",
//!     FetchConfig::default(),
//!     Arc::new(InMemoryRecordStore::new()),
//!     runtime.handle().clone(),
//! ));
//!
//! let proxy = registry.proxy("drive:1a2b3c", FileSource::new(factory))?;
//! let mut buf = vec![0u8; 64 * 1024];
//! let read = proxy.read_at(0, &mut buf);
//! proxy.on_release();
//! ```

mod cache_file;
pub mod chunk_set;
pub mod config;
pub mod error;
pub mod fetch;
pub mod memory_store;
pub mod proxy;
pub mod record;
pub mod registry;
pub mod remote_file;
pub mod source;
pub mod stats;

pub use chunk_set::{ByteRange, ChunkSet};
pub use config::FetchConfig;
pub use error::{CacheError, Result};
pub use fetch::{CancelCause, FetchOutcome};
pub use memory_store::InMemoryRecordStore;
pub use proxy::ProxyAdapter;
pub use record::CacheRecord;
pub use registry::AccessRegistry;
pub use remote_file::{
    cache_file_path, FetchPhase, RemoteRandomAccessFile, CACHE_FILES_DIR, UNBOUNDED_LENGTH,
};
pub use source::FileSource;
pub use stats::{FetchStats, FetchStatsSnapshot};
