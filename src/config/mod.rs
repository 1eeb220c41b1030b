//! Settings and configuration module
//!
//! Provides unified configuration with:
//! - Builder pattern
//! - JSON loading
//! - Interval window and proxy validation

pub mod config;

pub use config::{ConfigError, MonitorConfig, MonitorConfigBuilder};
