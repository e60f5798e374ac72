//! # Host Bridge Traits
//!
//! Contracts between the cache core and the host platform.
//!
//! ## Traits
//!
//! - [`RemoteStreamFactory`](stream::RemoteStreamFactory) - Opens byte-range streams over a remote file
//! - [`CacheRecordStore`](storage::CacheRecordStore) - Persists per-file cache metadata
//! - [`ProxyFileCallback`](proxy::ProxyFileCallback) - The size/read/release surface of an OS file proxy
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Android  | host-provided       | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! keep the message actionable (URL, path, status).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: a single stream factory is shared
//! by every reader of a file and by its background fetch task.

pub mod error;
pub mod proxy;
pub mod redact;
pub mod storage;
pub mod stream;

pub use error::BridgeError;

pub use proxy::ProxyFileCallback;
pub use redact::{redact_if_sensitive, redact_url};
pub use storage::{file_name_for_key, CacheRecordStore, StoredCacheRecord};
pub use stream::{ByteStream, RemoteStream, RemoteStreamFactory};
