use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true if retrying the same operation may succeed.
    ///
    /// Client errors are permanent, except request timeouts (408) and
    /// rate limiting (429).
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Http { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            BridgeError::NotAvailable(_) | BridgeError::Serialization(_) => false,
            BridgeError::OperationFailed(_) | BridgeError::Io(_) => true,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transient_classification() {
        let not_found = BridgeError::Http {
            status: 404,
            message: "Not Found".to_string(),
        };
        let throttled = BridgeError::Http {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        let unavailable = BridgeError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };

        assert!(!not_found.is_transient());
        assert!(throttled.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_io_errors_are_transient() {
        let err = BridgeError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(err.is_transient());
        assert!(err.to_string().contains("reset by peer"));
    }
}
