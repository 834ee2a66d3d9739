//! Logging setup.
//!
//! The crate logs through the `log` facade; this module installs
//! `env_logger` as the backend for binaries.

mod init;

pub use init::{init_logging, LoggingConfig};
