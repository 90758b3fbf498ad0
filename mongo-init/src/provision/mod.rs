//! Bootstrap executor
//!
//! Submits provisioning requests through a [`UserAdmin`] connection:
//! - Validation before any server call
//! - Existing-user policy (skip, fail, update)
//! - Confirmation lines for stdout

mod mongo;

pub use mongo::MongoAdmin;

use crate::error::ProvisionError;
use crate::request::{format_roles, RoleGrant, Secret, UserProvisioningRequest};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tracing::{info, warn};

/// A user that already exists on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingUser {
    pub roles: Vec<RoleGrant>,
}

/// User administration against a server bound to its admin context.
///
/// Every call names its database explicitly.
pub trait UserAdmin {
    /// Check the server is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Look up `username` in `database`.
    fn find_user(
        &self,
        database: &str,
        username: &str,
    ) -> impl Future<Output = Result<Option<ExistingUser>, ProvisionError>> + Send;

    fn create_user(
        &self,
        database: &str,
        username: &str,
        password: &Secret,
        roles: &[RoleGrant],
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Reset password and replace the role list.
    fn update_user(
        &self,
        database: &str,
        username: &str,
        password: &Secret,
        roles: &[RoleGrant],
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}

/// What to do when the requested user already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistingUserPolicy {
    /// Accept the user if its roles match, fail otherwise
    #[default]
    Skip,
    /// Any existing user is an error
    Fail,
    /// Reset password and roles
    Update,
}

impl FromStr for ExistingUserPolicy {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            "update" => Ok(Self::Update),
            other => Err(ProvisionError::Config(format!(
                "Unknown existing-user policy: {}. Expected: skip, fail or update",
                other
            ))),
        }
    }
}

impl fmt::Display for ExistingUserPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Fail => "fail",
            Self::Update => "update",
        })
    }
}

/// Result of a successful provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    /// Existing user already had the requested roles
    Unchanged,
    /// Existing user was reset
    Updated,
}

impl ProvisionOutcome {
    /// Line printed to stdout for `request`.
    pub fn confirmation(&self, request: &UserProvisioningRequest) -> String {
        match self {
            Self::Created => format!(
                "MongoDB user \"{}\" created successfully for database \"{}\"",
                request.username, request.target_database
            ),
            Self::Unchanged => format!(
                "MongoDB user \"{}\" already provisioned for database \"{}\"",
                request.username, request.target_database
            ),
            Self::Updated => format!(
                "MongoDB user \"{}\" updated for database \"{}\"",
                request.username, request.target_database
            ),
        }
    }
}

/// Validate every request, stopping at the first invalid one.
pub fn validate_all(requests: &[UserProvisioningRequest]) -> Result<(), ProvisionError> {
    if requests.is_empty() {
        return Err(ProvisionError::Config(
            "No provisioning requests configured".to_string(),
        ));
    }
    requests.iter().try_for_each(UserProvisioningRequest::validate)
}

/// Provision one user.
///
/// The request is validated before the server is contacted.
pub async fn provision<A: UserAdmin>(
    admin: &A,
    request: &UserProvisioningRequest,
    policy: ExistingUserPolicy,
) -> Result<ProvisionOutcome, ProvisionError> {
    request.validate()?;

    let database = request.target_database.as_str();
    let username = request.username.as_str();

    let Some(existing) = admin.find_user(database, username).await? else {
        admin
            .create_user(database, username, &request.password, &request.roles)
            .await?;
        info!(
            user = %username,
            database = %database,
            roles = %format_roles(&request.roles),
            "User created"
        );
        return Ok(ProvisionOutcome::Created);
    };

    match policy {
        ExistingUserPolicy::Fail => Err(ProvisionError::DuplicateUser {
            username: username.to_string(),
            database: database.to_string(),
        }),
        ExistingUserPolicy::Skip => {
            if same_grants(&existing.roles, &request.roles) {
                info!(user = %username, database = %database, "User already provisioned");
                Ok(ProvisionOutcome::Unchanged)
            } else {
                warn!(
                    user = %username,
                    database = %database,
                    existing = %format_roles(&existing.roles),
                    "Existing user has different roles"
                );
                Err(ProvisionError::RoleMismatch {
                    username: username.to_string(),
                    database: database.to_string(),
                    existing: format_roles(&existing.roles),
                    requested: format_roles(&request.roles),
                })
            }
        }
        ExistingUserPolicy::Update => {
            admin
                .update_user(database, username, &request.password, &request.roles)
                .await?;
            info!(
                user = %username,
                database = %database,
                roles = %format_roles(&request.roles),
                "User updated"
            );
            Ok(ProvisionOutcome::Updated)
        }
    }
}

/// Compare grants ignoring order and repeats.
fn same_grants(a: &[RoleGrant], b: &[RoleGrant]) -> bool {
    let normalize = |roles: &[RoleGrant]| {
        let mut roles = roles.to_vec();
        roles.sort();
        roles.dedup();
        roles
    };
    normalize(a) == normalize(b)
}
