//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `RemoteStreamFactory` using `reqwest` range requests
//! - `CacheRecordStore` using one JSON document per key
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_cache_dir, JsonFileRecordStore, ReqwestStreamFactory};
//!
//! let store = JsonFileRecordStore::new(default_cache_dir().join("records"))?;
//! let factory = ReqwestStreamFactory::new("https://media.example.com/Audio/42/stream")?
//!     .with_header("X-Emby-Token", token);
//! ```

mod http_stream;
mod record_store;

use std::path::PathBuf;

pub use http_stream::ReqwestStreamFactory;
pub use record_store::JsonFileRecordStore;

/// Platform cache directory for media files, `<cache>/media-vfs`.
///
/// Falls back to the system temp directory when the platform reports none.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("media-vfs")
}
