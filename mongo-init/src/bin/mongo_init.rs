//! MongoDB init hook
//!
//! Runs ONCE from the container's initialization hook (for the official image,
//! a shim in /docker-entrypoint-initdb.d). Creates the configured application
//! users and prints one confirmation line per user to stdout.
//! Any failure exits non-zero so container startup fails with it.

use common::init_logging;
use mongo_init::bootstrap::{load_requests, Config};
use mongo_init::{
    provision, validate_all, MongoAdmin, ProvisionError, ProvisionOutcome, Telemetry,
    TelemetryEvent, UserAdmin, UserProvisioningRequest,
};
use std::time::Instant;
use tracing::{error, info};

const COMPONENT: &str = "mongo-init";

/// A failed run, with the request in flight when there was one.
struct Failure {
    database: String,
    username: String,
    error: ProvisionError,
}

impl Failure {
    fn global(error: ProvisionError) -> Self {
        Self {
            database: String::new(),
            username: String::new(),
            error,
        }
    }

    fn for_request(request: &UserProvisioningRequest, error: ProvisionError) -> Self {
        Self {
            database: request.target_database.clone(),
            username: request.username.clone(),
            error,
        }
    }
}

fn outcome_event(request: &UserProvisioningRequest, outcome: ProvisionOutcome) -> TelemetryEvent {
    let database = request.target_database.clone();
    let username = request.username.clone();
    let roles = request.roles.iter().map(ToString::to_string).collect();
    match outcome {
        ProvisionOutcome::Created => TelemetryEvent::UserCreated {
            database,
            username,
            roles,
        },
        ProvisionOutcome::Unchanged => TelemetryEvent::UserUnchanged { database, username },
        ProvisionOutcome::Updated => TelemetryEvent::UserUpdated {
            database,
            username,
            roles,
        },
    }
}

async fn run(telemetry: &Telemetry) -> Result<Vec<String>, Failure> {
    let config = Config::from_env().map_err(Failure::global)?;
    let requests = load_requests(config.manifest.as_deref()).map_err(Failure::global)?;

    // Reject every bad request before touching the server
    validate_all(&requests).map_err(Failure::global)?;

    info!(
        uri = %config.redacted_uri(),
        on_existing = %config.on_existing,
        users = requests.len(),
        "Connecting to MongoDB"
    );

    let admin = MongoAdmin::connect(&config.uri, config.server_selection_timeout)
        .await
        .map_err(Failure::global)?;
    admin.ping().await.map_err(Failure::global)?;

    let mut provisioned = Vec::with_capacity(requests.len());
    for request in &requests {
        telemetry
            .send(TelemetryEvent::ProvisionStarted {
                database: request.target_database.clone(),
                username: request.username.clone(),
            })
            .await;

        let outcome = provision(&admin, request, config.on_existing)
            .await
            .map_err(|e| Failure::for_request(request, e))?;

        println!("{}", outcome.confirmation(request));
        telemetry.send(outcome_event(request, outcome)).await;
        provisioned.push(request.username.clone());
    }

    Ok(provisioned)
}

#[tokio::main]
async fn main() {
    let _guard = init_logging(COMPONENT);

    let start = Instant::now();
    let telemetry = Telemetry::from_env(COMPONENT);

    telemetry
        .send(TelemetryEvent::ComponentStarted {
            component: COMPONENT.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .await;

    match run(&telemetry).await {
        Ok(users) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            telemetry
                .send(TelemetryEvent::ProvisionCompleted { users, duration_ms })
                .await;
        }
        Err(failure) => {
            error!(
                error = %failure.error,
                phase = failure.error.phase(),
                "Bootstrap failed"
            );
            let code = failure.error.exit_code();
            telemetry
                .send(TelemetryEvent::ProvisionFailed {
                    database: failure.database,
                    username: failure.username,
                    error: failure.error.to_string(),
                    phase: failure.error.phase().to_string(),
                })
                .await;
            std::process::exit(code);
        }
    }
}
