//! Shared utilities for mongo-init components
//!
//! This crate provides common functionality used across the workspace:
//! - Structured logging initialization
//! - Environment variable parsing helpers
//! - Telemetry for reporting bootstrap events

pub mod config;
pub mod logging;
pub mod telemetry;

pub use config::{read_secret_file, ConfigExt};
pub use logging::init_logging;
pub use telemetry::{Telemetry, TelemetryEvent};
