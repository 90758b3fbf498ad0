//! Provisioning request sources
//!
//! Requests come either from a YAML manifest listing several users, or from
//! `MONGO_INIT_*` variables describing a single user.

use super::config::config_error;
use crate::error::ProvisionError;
use crate::request::{parse_roles, RoleGrant, UserProvisioningRequest};
use common::{read_secret_file, ConfigExt};
use serde::Deserialize;
use std::path::Path;

/// Users to provision, as read from a manifest file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    users: Vec<ManifestUser>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestUser {
    database: String,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_env: Option<String>,
    #[serde(default)]
    password_file: Option<String>,
    /// Defaults to readWrite on `database`
    #[serde(default)]
    roles: Option<Vec<RoleGrant>>,
}

impl ManifestUser {
    fn resolve_password(&self) -> Result<String, ProvisionError> {
        match (&self.password, &self.password_env, &self.password_file) {
            (Some(password), None, None) => Ok(password.clone()),
            (None, Some(var), None) => String::env_required(var).map_err(config_error),
            (None, None, Some(path)) => read_secret_file(path).map_err(config_error),
            (None, None, None) => Err(ProvisionError::Config(format!(
                "User \"{}\" has no password source. Set one of password, password_env or password_file",
                self.username
            ))),
            _ => Err(ProvisionError::Config(format!(
                "User \"{}\" has more than one password source",
                self.username
            ))),
        }
    }

    fn into_request(self) -> Result<UserProvisioningRequest, ProvisionError> {
        let password = self.resolve_password()?;
        let request = UserProvisioningRequest::new(self.database, self.username, password);
        Ok(match self.roles {
            Some(roles) => request.with_roles(roles),
            None => request,
        })
    }
}

impl Manifest {
    /// Parse manifest YAML.
    pub fn parse(content: &str) -> Result<Self, ProvisionError> {
        let manifest: Manifest = serde_yaml::from_str(content)
            .map_err(|e| ProvisionError::Config(format!("Failed to parse manifest: {}", e)))?;
        if manifest.users.is_empty() {
            return Err(ProvisionError::Config(
                "Manifest lists no users".to_string(),
            ));
        }
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Resolve passwords and build requests, in manifest order.
    pub fn into_requests(self) -> Result<Vec<UserProvisioningRequest>, ProvisionError> {
        self.users
            .into_iter()
            .map(ManifestUser::into_request)
            .collect()
    }
}

/// Build the single request described by `MONGO_INIT_*` variables.
pub fn request_from_env() -> Result<UserProvisioningRequest, ProvisionError> {
    let database = String::env_required("MONGO_INIT_DATABASE").map_err(config_error)?;
    let username = String::env_required("MONGO_INIT_USERNAME").map_err(config_error)?;
    let password = String::env_secret("MONGO_INIT_PASSWORD")
        .map_err(config_error)?
        .ok_or_else(|| {
            ProvisionError::Config(
                "MONGO_INIT_PASSWORD or MONGO_INIT_PASSWORD_FILE must be set".to_string(),
            )
        })?;

    let request = UserProvisioningRequest::new(database.clone(), username, password);
    Ok(match String::env_optional("MONGO_INIT_ROLES") {
        Some(roles) => request.with_roles(parse_roles(&roles, &database)?),
        None => request,
    })
}

/// Requests for this run: the manifest when configured, the env request otherwise.
pub fn load_requests(
    manifest: Option<&str>,
) -> Result<Vec<UserProvisioningRequest>, ProvisionError> {
    match manifest {
        Some(path) => Manifest::from_file(path)?.into_requests(),
        None => Ok(vec![request_from_env()?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_manifest_with_default_roles() {
        let manifest = Manifest::parse(
            r#"
users:
  - database: ratingsdb
    username: ratingservice
    password: ratingpass123
  - database: notificationsdb
    username: notificationservice
    password: notificationpass123
"#,
        )
        .unwrap();

        let requests = manifest.into_requests().unwrap();
        assert_eq!(
            requests,
            vec![
                UserProvisioningRequest::new("ratingsdb", "ratingservice", "ratingpass123"),
                UserProvisioningRequest::new(
                    "notificationsdb",
                    "notificationservice",
                    "notificationpass123"
                ),
            ]
        );
    }

    #[test]
    fn test_manifest_explicit_roles_and_password_env() {
        env::set_var("MANIFEST_TEST_RATING_PASSWORD", "from-env");
        let manifest = Manifest::parse(
            r#"
users:
  - database: ratingsdb
    username: ratingservice
    password_env: MANIFEST_TEST_RATING_PASSWORD
    roles:
      - { role: readWrite, db: ratingsdb }
      - { role: read, db: catalogdb }
"#,
        )
        .unwrap();

        let requests = manifest.into_requests().unwrap();
        assert_eq!(requests[0].password.expose(), "from-env");
        assert_eq!(
            requests[0].roles,
            vec![
                RoleGrant::read_write("ratingsdb"),
                RoleGrant::new("read", "catalogdb"),
            ]
        );
    }

    #[test]
    fn test_manifest_password_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "filepass").unwrap();
        let manifest = Manifest::parse(&format!(
            "users:\n  - database: ratingsdb\n    username: ratingservice\n    password_file: {}\n",
            file.path().display()
        ))
        .unwrap();

        let requests = manifest.into_requests().unwrap();
        assert_eq!(requests[0].password.expose(), "filepass");
    }

    #[test]
    fn test_manifest_rejects_ambiguous_password() {
        let manifest = Manifest::parse(
            r#"
users:
  - database: ratingsdb
    username: ratingservice
    password: a
    password_env: B
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.into_requests(),
            Err(ProvisionError::Config(_))
        ));
    }

    #[test]
    fn test_manifest_rejects_missing_password() {
        let manifest =
            Manifest::parse("users:\n  - database: ratingsdb\n    username: ratingservice\n")
                .unwrap();
        assert!(manifest.into_requests().is_err());
    }

    #[test]
    fn test_manifest_rejects_empty_and_unknown_fields() {
        assert!(Manifest::parse("users: []").is_err());
        assert!(Manifest::parse(
            "users:\n  - database: a\n    username: b\n    password: c\n    pwd: d\n"
        )
        .is_err());
    }

    #[test]
    fn test_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "users:\n  - database: ratingsdb\n    username: ratingservice\n    password: x\n"
        )
        .unwrap();
        let path = file.path().display().to_string();
        let requests = load_requests(Some(path.as_str())).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(load_requests(Some("/nonexistent/users.yml")).is_err());
    }

    #[test]
    fn test_request_from_env() {
        env::set_var("MONGO_INIT_DATABASE", "notificationsdb");
        env::set_var("MONGO_INIT_USERNAME", "notificationservice");
        env::set_var("MONGO_INIT_PASSWORD", "notificationpass123");
        env::remove_var("MONGO_INIT_PASSWORD_FILE");
        env::remove_var("MONGO_INIT_ROLES");

        let request = request_from_env().unwrap();
        assert_eq!(
            request,
            UserProvisioningRequest::new(
                "notificationsdb",
                "notificationservice",
                "notificationpass123"
            )
        );

        env::set_var("MONGO_INIT_ROLES", "readWrite,read@auditdb");
        let request = request_from_env().unwrap();
        assert_eq!(
            request.roles,
            vec![
                RoleGrant::read_write("notificationsdb"),
                RoleGrant::new("read", "auditdb"),
            ]
        );

        env::remove_var("MONGO_INIT_PASSWORD");
        assert!(matches!(
            request_from_env(),
            Err(ProvisionError::Config(_))
        ));
    }
}
