//! Utility functions and types.
//!
//! This module provides configuration loading and logging setup shared by
//! every isobridge crate.

pub mod config;
pub mod logging;

pub use config::{BridgeConfig, LoggingConfig, RedirectConfig, TeardownConfig};
pub use logging::{init_logging, LogLevel};
