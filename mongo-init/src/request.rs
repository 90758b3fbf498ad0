//! User provisioning requests
//!
//! A request names the database a user is scoped to, the credentials, and the
//! role grants. Requests are validated before anything is sent to the server.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default role granted on the target database.
pub const DEFAULT_ROLE: &str = "readWrite";

/// Characters MongoDB rejects in database names.
const FORBIDDEN_DB_CHARS: &[char] = &[
    '/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0',
];

/// Database names must be shorter than this many bytes.
const MAX_DB_NAME_BYTES: usize = 64;

/// A (role, database) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }

    /// `readWrite` on `db`.
    pub fn read_write(db: impl Into<String>) -> Self {
        Self::new(DEFAULT_ROLE, db)
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Parse a `role@db,role@db` list. A bare `role` is granted on `default_db`.
pub fn parse_roles(list: &str, default_db: &str) -> Result<Vec<RoleGrant>, ProvisionError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('@') {
            Some((role, db)) if !role.is_empty() && !db.is_empty() => {
                Ok(RoleGrant::new(role, db))
            }
            Some(_) => Err(ProvisionError::Config(format!(
                "Invalid role grant: {}. Expected: role@database",
                entry
            ))),
            None => Ok(RoleGrant::new(entry, default_db)),
        })
        .collect()
}

/// Render grants as `role@db, role@db`.
pub fn format_roles(roles: &[RoleGrant]) -> String {
    roles
        .iter()
        .map(RoleGrant::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A password that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Declarative instruction to create one database user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProvisioningRequest {
    pub target_database: String,
    pub username: String,
    pub password: Secret,
    pub roles: Vec<RoleGrant>,
}

impl UserProvisioningRequest {
    /// Request with the default `readWrite` grant on `target_database`.
    pub fn new(
        target_database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let target_database = target_database.into();
        Self {
            roles: vec![RoleGrant::read_write(target_database.clone())],
            target_database,
            username: username.into(),
            password: Secret::new(password),
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleGrant>) -> Self {
        self.roles = roles;
        self
    }

    /// Check the request can be submitted.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.target_database.trim().is_empty() {
            return Err(invalid("target database must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(invalid("username must not be empty"));
        }
        if self.password.is_empty() {
            return Err(invalid(format!(
                "password for user \"{}\" must not be empty",
                self.username
            )));
        }
        validate_database_name(&self.target_database)?;

        if self.roles.is_empty() {
            return Err(invalid(format!(
                "user \"{}\" must be granted at least one role",
                self.username
            )));
        }
        for grant in &self.roles {
            if grant.role.is_empty() || grant.db.is_empty() {
                return Err(invalid(format!(
                    "role grant \"{}\" needs both a role and a database",
                    grant
                )));
            }
            validate_database_name(&grant.db)?;
        }

        Ok(())
    }
}

fn validate_database_name(name: &str) -> Result<(), ProvisionError> {
    if let Some(c) = name.chars().find(|c| FORBIDDEN_DB_CHARS.contains(c)) {
        return Err(invalid(format!(
            "database name \"{}\" contains forbidden character {:?}",
            name, c
        )));
    }
    if name.len() >= MAX_DB_NAME_BYTES {
        return Err(invalid(format!(
            "database name \"{}\" must be shorter than {} bytes",
            name, MAX_DB_NAME_BYTES
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidRequest(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grants_read_write_on_target() {
        let request = UserProvisioningRequest::new("ratingsdb", "ratingservice", "ratingpass123");
        assert_eq!(request.roles, vec![RoleGrant::new("readWrite", "ratingsdb")]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_username_rejected() {
        let request = UserProvisioningRequest::new("ratingsdb", "", "ratingpass123");
        assert!(matches!(
            request.validate(),
            Err(ProvisionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_blank_username_rejected() {
        let request = UserProvisioningRequest::new("ratingsdb", "  ", "ratingpass123");
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("username must not be empty"));
    }

    #[test]
    fn test_empty_database_rejected() {
        let request = UserProvisioningRequest::new("", "ratingservice", "ratingpass123");
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("target database"));
    }

    #[test]
    fn test_empty_password_rejected() {
        let request = UserProvisioningRequest::new("ratingsdb", "ratingservice", "");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_empty_roles_rejected() {
        let request =
            UserProvisioningRequest::new("ratingsdb", "ratingservice", "pw").with_roles(vec![]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_forbidden_database_characters_rejected() {
        for name in ["ratings.db", "ratings db", "rat$ings", "a/b"] {
            let request = UserProvisioningRequest::new(name, "ratingservice", "pw");
            assert!(request.validate().is_err(), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_long_database_name_rejected() {
        let request = UserProvisioningRequest::new("d".repeat(64), "u", "pw");
        assert!(request.validate().is_err());
        let request = UserProvisioningRequest::new("d".repeat(63), "u", "pw");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_parse_roles_defaults_database() {
        let roles = parse_roles("readWrite, read@reporting", "ratingsdb").unwrap();
        assert_eq!(
            roles,
            vec![
                RoleGrant::new("readWrite", "ratingsdb"),
                RoleGrant::new("read", "reporting"),
            ]
        );
    }

    #[test]
    fn test_parse_roles_rejects_dangling_at() {
        assert!(matches!(
            parse_roles("readWrite@", "ratingsdb"),
            Err(ProvisionError::Config(_))
        ));
    }

    #[test]
    fn test_secret_is_redacted() {
        let request = UserProvisioningRequest::new("ratingsdb", "ratingservice", "ratingpass123");
        let debug = format!("{:?}", request);
        assert!(!debug.contains("ratingpass123"));
        assert_eq!(request.password.expose(), "ratingpass123");
    }
}
