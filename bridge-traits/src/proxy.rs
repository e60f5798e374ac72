//! OS File Proxy Contract
//!
//! Hosts that expose a virtual file descriptor (for example a
//! `ProxyFileDescriptorCallback` on Android or a FUSE read handler) drive it
//! through these three calls. Offsets and sizes use the signed widths those
//! platform APIs use.

/// Callback surface behind a proxied file descriptor.
pub trait ProxyFileCallback: Send + Sync {
    /// Size of the file in bytes. May be an estimate while streaming.
    fn on_get_size(&self) -> i64;

    /// Fill `buf` from `offset`. Returns the number of bytes written,
    /// 0 on end of file or transient failure, never negative.
    fn on_read(&self, offset: i64, buf: &mut [u8]) -> i32;

    /// The descriptor was closed. Called once per opened descriptor;
    /// implementations must tolerate repeated calls.
    fn on_release(&self);
}
