//! Remote file description handed to the registry on acquire.

use bridge_traits::RemoteStreamFactory;
use std::sync::Arc;

/// How to reach a remote file, plus the hints used to estimate its length
/// while it is still streaming.
#[derive(Clone)]
pub struct FileSource {
    pub factory: Arc<dyn RemoteStreamFactory>,

    /// Bits per second of the stream, if negotiated
    pub bitrate: Option<u64>,

    /// Media duration in milliseconds, if known
    pub duration_ms: Option<u64>,
}

impl FileSource {
    pub fn new(factory: Arc<dyn RemoteStreamFactory>) -> Self {
        Self {
            factory,
            bitrate: None,
            duration_ms: None,
        }
    }

    pub fn with_bitrate(mut self, bits_per_second: u64) -> Self {
        self.bitrate = Some(bits_per_second);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Length estimate from bitrate and duration, in bytes.
    pub fn estimated_length(&self) -> Option<u64> {
        estimate_length(self.bitrate?, self.duration_ms?)
    }
}

/// `duration_ms * bits_per_second / 8000`, saturating.
pub(crate) fn estimate_length(bits_per_second: u64, duration_ms: u64) -> Option<u64> {
    Some(duration_ms.saturating_mul(bits_per_second) / 8000)
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("factory", &"RemoteStreamFactory { ... }")
            .field("bitrate", &self.bitrate)
            .field("duration_ms", &self.duration_ms)
            .finish()
    }
}
