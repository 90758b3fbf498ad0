//! Bootstrap inputs
//!
//! This module provides what the init hook needs before it talks to MongoDB:
//! - Connection and policy settings from the environment
//! - Provisioning requests from a manifest or from the environment

mod config;
mod manifest;

pub use config::{build_uri, redact_uri, Config, DEFAULT_HOST};
pub use manifest::{load_requests, request_from_env, Manifest};
