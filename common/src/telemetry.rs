//! Telemetry for reporting bootstrap events
//!
//! Events are always logged locally. When an endpoint is configured they are
//! also posted to it as JSON.

use crate::config::ConfigExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding the telemetry endpoint.
pub const TELEMETRY_URL_ENV: &str = "MONGO_INIT_TELEMETRY_URL";

/// All telemetry events emitted during a bootstrap run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Component started
    ComponentStarted { component: String, version: String },

    /// A provisioning request is about to be submitted
    ProvisionStarted { database: String, username: String },

    /// User did not exist and was created
    UserCreated {
        database: String,
        username: String,
        roles: Vec<String>,
    },

    /// User already existed with the requested roles
    UserUnchanged { database: String, username: String },

    /// User already existed and was reset to the requested password and roles
    UserUpdated {
        database: String,
        username: String,
        roles: Vec<String>,
    },

    /// Provisioning failed
    ProvisionFailed {
        database: String,
        username: String,
        error: String,
        phase: String,
    },

    /// Every request in the run succeeded
    ProvisionCompleted { users: Vec<String>, duration_ms: u64 },
}

impl TelemetryEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ComponentStarted { .. } => "COMPONENT_STARTED",
            Self::ProvisionStarted { .. } => "MONGO_INIT_PROVISION_STARTED",
            Self::UserCreated { .. } => "MONGO_INIT_USER_CREATED",
            Self::UserUnchanged { .. } => "MONGO_INIT_USER_UNCHANGED",
            Self::UserUpdated { .. } => "MONGO_INIT_USER_UPDATED",
            Self::ProvisionFailed { .. } => "MONGO_INIT_PROVISION_FAILED",
            Self::ProvisionCompleted { .. } => "MONGO_INIT_PROVISION_COMPLETED",
        }
    }

    /// Convert event to a human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::ComponentStarted { component, version } => {
                format!("{} v{} started", component, version)
            }
            Self::ProvisionStarted { database, username } => {
                format!("Provisioning {} on {}", username, database)
            }
            Self::UserCreated {
                database,
                username,
                roles,
            } => {
                format!("Created {} on {} with roles {:?}", username, database, roles)
            }
            Self::UserUnchanged { database, username } => {
                format!("{} already provisioned on {}", username, database)
            }
            Self::UserUpdated {
                database,
                username,
                roles,
            } => {
                format!("Updated {} on {} with roles {:?}", username, database, roles)
            }
            Self::ProvisionFailed {
                database,
                username,
                error,
                phase,
            } => {
                format!(
                    "Provisioning {} on {} failed during {}: {}",
                    username, database, phase, error
                )
            }
            Self::ProvisionCompleted { users, duration_ms } => {
                format!("Provisioned {} user(s) in {}ms", users.len(), duration_ms)
            }
        }
    }

    /// JSON body posted to the telemetry endpoint.
    pub fn payload(&self, component: &str) -> Value {
        json!({
            "event": self.event_type(),
            "message": self.message(),
            "component": component,
            "data": self,
        })
    }
}

/// Telemetry client for sending events.
#[derive(Clone)]
pub struct Telemetry {
    client: Client,
    endpoint: Option<String>,
    component: String,
}

impl Telemetry {
    /// Create a telemetry client posting to `endpoint`, or logging only when `None`.
    pub fn new(component: &str, endpoint: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint,
            component: component.to_string(),
        }
    }

    /// Create a new telemetry client from environment variables.
    pub fn from_env(component: &str) -> Self {
        Self::new(component, String::env_optional(TELEMETRY_URL_ENV))
    }

    /// Whether events leave the process.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Send a telemetry event.
    ///
    /// Errors are logged but do not affect the caller.
    pub async fn send(&self, event: TelemetryEvent) {
        info!(event = %event.event_type(), "{}", event.message());

        let Some(endpoint) = &self.endpoint else {
            return;
        };

        match self
            .client
            .post(endpoint)
            .json(&event.payload(&self.component))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!("Telemetry got status {}", resp.status());
            }
            Err(e) => {
                warn!("Telemetry send failed: {}", e);
            }
        }
    }
}
