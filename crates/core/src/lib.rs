//! Core functionality for the Trustgate privileged-signer trust layer.
//!
//! This crate provides the process-wide configuration, logging setup and
//! error types shared by the rest of the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{LogFormat, LoggingConfig, NetworkEnvironment, TrustConfig};
pub use error::{CoreError, Result};
