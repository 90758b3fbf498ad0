//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration from environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::str::FromStr;

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars with defaults, required values,
/// secrets and type parsing.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let host = String::env_or("MONGO_INIT_HOST", "localhost:27017");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get a required environment variable, returning an error if not set.
    ///
    /// # Example
    /// ```ignore
    /// let db = String::env_required("MONGO_INIT_DATABASE")?;
    /// ```
    fn env_required(name: &str) -> Result<String> {
        env::var(name).context(format!("{} must be set", name))
    }

    /// Get an environment variable, treating unset and empty the same.
    fn env_optional(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    ///
    /// # Example
    /// ```ignore
    /// let timeout: u64 = u64::env_parse("MONGO_INIT_SERVER_SELECTION_TIMEOUT", 30);
    /// ```
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get a secret from `NAME` or from the file named by `NAME_FILE`.
    ///
    /// Follows the docker secrets convention. Setting both is an error.
    /// A single trailing newline in the file is dropped.
    fn env_secret(name: &str) -> Result<Option<String>> {
        let file_var = format!("{}_FILE", name);
        match (String::env_optional(name), String::env_optional(&file_var)) {
            (Some(_), Some(_)) => bail!("{} and {} are mutually exclusive", name, file_var),
            (Some(value), None) => Ok(Some(value)),
            (None, Some(path)) => read_secret_file(&path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

/// Read a secret file, stripping one trailing newline.
pub fn read_secret_file(path: &str) -> Result<String> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read secret file {}", path))?;
    let trimmed = content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(&content);
    Ok(trimmed.to_string())
}
