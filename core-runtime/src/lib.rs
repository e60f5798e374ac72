//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the media VFS core:
//! - Logging and tracing infrastructure
//! - Configuration management with fail-fast capability checks
//!
//! ## Overview
//!
//! Every other core crate logs through the conventions set up here and is
//! wired together from a [`VfsConfig`](config::VfsConfig).

pub mod config;
pub mod error;
pub mod logging;

pub use config::{VfsConfig, VfsConfigBuilder};
pub use error::{Error, Result};
