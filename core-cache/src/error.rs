//! Error types for the cache core.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by the remote-backed cache.
#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Fetch Errors
    // ========================================================================
    #[error("Remote stream error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Cache file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote stream ended at {position} of {expected} bytes")]
    UnexpectedEof { position: u64, expected: u64 },

    // ========================================================================
    // Caller Errors
    // ========================================================================
    #[error("Invalid read range: offset {offset}, size {size}")]
    InvalidRange { offset: u64, size: usize },

    #[error("Handle closed: {0}")]
    Closed(String),

    // ========================================================================
    // Setup Errors
    // ========================================================================
    #[error("Invalid fetch configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Returns true if this error is transient and the fetch should be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Bridge(err) => err.is_transient(),
            CacheError::Io(_) | CacheError::UnexpectedEof { .. } => true,
            CacheError::InvalidRange { .. }
            | CacheError::Closed(_)
            | CacheError::InvalidConfig(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let reset = CacheError::from(BridgeError::OperationFailed("connection reset".to_string()));
        assert!(reset.is_transient());

        let gone = CacheError::from(BridgeError::Http {
            status: 410,
            message: "Gone".to_string(),
        });
        assert!(!gone.is_transient());

        let short = CacheError::UnexpectedEof {
            position: 10,
            expected: 20,
        };
        assert!(short.is_transient());

        assert!(!CacheError::Closed("doc-1".to_string()).is_transient());
    }
}
