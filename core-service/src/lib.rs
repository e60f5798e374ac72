//! Media VFS service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (remote streams,
//! record persistence) into the cache core and hands out [`ProxyAdapter`]s
//! for the host's proxied file descriptors. Desktop apps typically enable
//! the `desktop-shims` feature (which depends on `bridge-desktop`) and use
//! [`bootstrap_desktop`]; mobile hosts build a [`VfsConfig`] with their own
//! record store.

pub mod error;

pub use error::{CoreError, Result};

pub use core_cache::{FetchConfig, FileSource, ProxyAdapter, RemoteRandomAccessFile};
pub use core_runtime::VfsConfig;

use std::sync::Arc;

use core_async::runtime::{current_handle, Handle};
use core_cache::AccessRegistry;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct MediaVfs {
    registry: Arc<AccessRegistry>,
    config: Arc<VfsConfig>,
}

impl std::fmt::Debug for MediaVfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaVfs")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

impl MediaVfs {
    /// Create the service from a validated configuration.
    ///
    /// Fetch jobs run on `config.runtime`, or on the runtime this is called
    /// from when none was configured.
    ///
    /// # Errors
    ///
    /// - `CoreError::InitializationFailed` if `fetch` is invalid
    /// - `CoreError::CapabilityMissing` if no runtime is available
    pub fn new(config: VfsConfig, fetch: FetchConfig) -> Result<Self> {
        config.validate()?;
        fetch
            .validate()
            .map_err(|e| CoreError::InitializationFailed(format!("Invalid fetch configuration: {}", e)))?;

        let runtime = resolve_runtime(&config)?;
        let registry = AccessRegistry::new(
            config.cache_dir.clone(),
            fetch,
            Arc::clone(&config.record_store),
            runtime,
        );

        info!(cache_dir = %config.cache_dir.display(), "Media VFS ready");
        Ok(Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// The registry behind this service, for hosts that manage handles
    /// directly.
    pub fn registry(&self) -> Arc<AccessRegistry> {
        Arc::clone(&self.registry)
    }

    /// Open a proxy for `key`. The proxy holds one registry reference until
    /// it is released or dropped.
    pub fn open(&self, key: &str, source: FileSource) -> Result<ProxyAdapter> {
        Ok(self.registry.proxy(key, source)?)
    }

    /// Open a proxy for `key` streamed over HTTP range requests.
    ///
    /// `headers` are sent with every request, typically an auth token.
    #[cfg(feature = "desktop-shims")]
    pub fn open_url(
        &self,
        key: &str,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<ProxyAdapter> {
        use bridge_desktop::ReqwestStreamFactory;

        let mut factory = ReqwestStreamFactory::new(url)?;
        for (name, value) in headers {
            factory = factory.with_header(name.clone(), value.clone());
        }
        self.open(key, FileSource::new(Arc::new(factory)))
    }

    /// Close every open handle. Returns the number closed.
    pub fn shutdown(&self) -> usize {
        let closed = self.registry.close_all();
        info!(closed, "Media VFS shut down");
        closed
    }
}

fn resolve_runtime(config: &VfsConfig) -> Result<Handle> {
    config
        .runtime
        .clone()
        .or_else(current_handle)
        .ok_or_else(|| CoreError::CapabilityMissing {
            capability: "Runtime".to_string(),
            message: "Fetch jobs need a tokio runtime. Pass a Handle to VfsConfigBuilder::runtime() \
                      or construct MediaVfs from within a runtime."
                .to_string(),
        })
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the platform cache directory and the default JSON record store.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, FetchConfig};
///
/// let vfs = bootstrap_desktop(FetchConfig::default())?;
/// let proxy = vfs.open_url("track-42", "https://media.example.com/track/42", &[])?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(fetch: FetchConfig) -> Result<MediaVfs> {
    let mut builder = VfsConfig::builder().cache_dir(bridge_desktop::default_cache_dir());
    if let Some(handle) = current_handle() {
        builder = builder.runtime(handle);
    }
    MediaVfs::new(builder.build()?, fetch)
}
