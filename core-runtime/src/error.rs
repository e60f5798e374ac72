//! Errors raised while assembling the runtime: configuration, logging
//! setup and default bridge providers.

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value or logging setup failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge was neither injected nor available as a platform default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A default bridge implementation failed to start.
    #[error("Default {capability} unavailable: {source}")]
    DefaultProvider {
        capability: &'static str,
        #[source]
        source: BridgeError,
    },
}

impl Error {
    /// Name of the capability this error is about, if any.
    pub fn capability(&self) -> Option<&str> {
        match self {
            Error::CapabilityMissing { capability, .. } => Some(capability),
            Error::DefaultProvider { capability, .. } => Some(capability),
            Error::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
