//! MongoDB application-user bootstrap
//!
//! Creates application users with role grants scoped to their databases when
//! a MongoDB container initializes. Requests come from the environment or a
//! manifest, are validated up front, and are submitted one at a time.

pub mod bootstrap;
pub mod error;
pub mod provision;
pub mod request;

pub use common::{ConfigExt, Telemetry, TelemetryEvent};
pub use error::ProvisionError;
pub use provision::{
    provision, validate_all, ExistingUser, ExistingUserPolicy, MongoAdmin, ProvisionOutcome,
    UserAdmin,
};
pub use request::{RoleGrant, Secret, UserProvisioningRequest};
