//! Bootstrap configuration from environment variables

use crate::error::ProvisionError;
use crate::provision::ExistingUserPolicy;
use common::ConfigExt;
use std::time::Duration;

/// Default server address inside the init container.
pub const DEFAULT_HOST: &str = "localhost:27017";

/// Configuration for a bootstrap run
pub struct Config {
    /// Connection string. May carry credentials; log [`Config::redacted_uri`] instead.
    pub uri: String,
    pub server_selection_timeout: Duration,
    pub on_existing: ExistingUserPolicy,
    /// Manifest listing the users to provision. Unset means single-request env mode.
    pub manifest: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ProvisionError> {
        let uri = match String::env_optional("MONGO_INIT_URI") {
            Some(uri) => uri,
            None => {
                let root_user = String::env_optional("MONGO_INITDB_ROOT_USERNAME");
                let root_pass = String::env_secret("MONGO_INITDB_ROOT_PASSWORD")
                    .map_err(config_error)?;
                build_uri(
                    &String::env_or("MONGO_INIT_HOST", DEFAULT_HOST),
                    root_user.as_deref(),
                    root_pass.as_deref(),
                )
            }
        };

        let on_existing = match String::env_optional("MONGO_INIT_ON_EXISTING") {
            Some(policy) => policy.parse()?,
            None => ExistingUserPolicy::default(),
        };

        Ok(Self {
            uri,
            server_selection_timeout: Duration::from_secs(u64::env_parse(
                "MONGO_INIT_SERVER_SELECTION_TIMEOUT",
                30,
            )),
            on_existing,
            manifest: String::env_optional("MONGO_INIT_MANIFEST"),
        })
    }

    /// Connection string with any credentials masked.
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }
}

/// Build a connection string for `host`, authenticating against `admin`
/// when root credentials are present.
pub fn build_uri(host: &str, root_user: Option<&str>, root_pass: Option<&str>) -> String {
    match (root_user, root_pass) {
        (Some(user), Some(pass)) => format!(
            "mongodb://{}:{}@{}/?authSource=admin",
            urlencoding::encode(user),
            urlencoding::encode(pass),
            host
        ),
        _ => format!("mongodb://{}/", host),
    }
}

/// Mask the userinfo part of a connection string.
///
/// Masks everything up to the last `@`, so a raw `/` or `?` in an
/// unencoded password cannot end the userinfo early.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    match rest.rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => uri.to_string(),
    }
}

pub(crate) fn config_error(err: anyhow::Error) -> ProvisionError {
    ProvisionError::Config(format!("{:#}", err))
}
