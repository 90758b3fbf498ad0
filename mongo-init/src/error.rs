//! Provisioning error taxonomy
//!
//! Every failure maps to its own variant and exit code so container
//! orchestration can tell a dead server from a privilege problem.

use mongodb::error::{Error as DriverError, ErrorKind};
use thiserror::Error;

/// Server code for `Unauthorized`.
pub const CODE_UNAUTHORIZED: i32 = 13;
/// Server code for `AuthenticationFailed`.
pub const CODE_AUTHENTICATION_FAILED: i32 = 18;
/// Server code returned by `createUser` when the user already exists.
pub const CODE_USER_EXISTS: i32 = 51003;

/// Errors that can occur while provisioning a user
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Request failed validation; nothing was sent to the server
    #[error("Invalid provisioning request: {0}")]
    InvalidRequest(String),

    /// Environment or manifest could not be turned into requests
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server unreachable
    #[error("Cannot reach MongoDB: {0}")]
    Connection(String),

    #[error("MongoDB user \"{username}\" already exists in database \"{database}\"")]
    DuplicateUser { username: String, database: String },

    /// Missing privilege or bad admin credentials
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// User exists but with different grants than requested
    #[error(
        "MongoDB user \"{username}\" in database \"{database}\" has roles [{existing}], requested [{requested}]"
    )]
    RoleMismatch {
        username: String,
        database: String,
        existing: String,
        requested: String,
    },

    #[error("MongoDB command failed ({code}): {message}")]
    Command { code: i32, message: String },

    #[error("MongoDB driver error: {0}")]
    Driver(String),
}

impl ProvisionError {
    /// Process exit code, sysexits style.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) => 65,
            Self::Connection(_) => 69,
            Self::Command { .. } | Self::Driver(_) => 70,
            Self::DuplicateUser { .. } | Self::RoleMismatch { .. } => 73,
            Self::Authorization(_) => 77,
            Self::Config(_) => 78,
        }
    }

    /// Bootstrap phase reported in telemetry.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "validate",
            Self::Config(_) => "config",
            Self::Connection(_) => "connect",
            Self::Authorization(_) => "authorize",
            Self::DuplicateUser { .. } | Self::RoleMismatch { .. } => "existing_user",
            Self::Command { .. } | Self::Driver(_) => "command",
        }
    }
}

/// Map a server command error code onto the taxonomy.
pub fn classify_command_code(
    code: i32,
    message: &str,
    username: &str,
    database: &str,
) -> ProvisionError {
    match code {
        CODE_UNAUTHORIZED | CODE_AUTHENTICATION_FAILED => {
            ProvisionError::Authorization(message.to_string())
        }
        CODE_USER_EXISTS => ProvisionError::DuplicateUser {
            username: username.to_string(),
            database: database.to_string(),
        },
        _ => ProvisionError::Command {
            code,
            message: message.to_string(),
        },
    }
}

/// Map a driver error onto the taxonomy.
///
/// `username` and `database` name the request in flight so a duplicate
/// conflict reports what collided.
pub fn classify_driver_error(err: DriverError, username: &str, database: &str) -> ProvisionError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { message, .. }
        | ErrorKind::ConnectionPoolCleared { message, .. }
        | ErrorKind::DnsResolve { message, .. } => ProvisionError::Connection(message.clone()),
        ErrorKind::Io(io_err) => ProvisionError::Connection(io_err.to_string()),
        ErrorKind::Authentication { message, .. } => {
            ProvisionError::Authorization(message.clone())
        }
        ErrorKind::Command(command_err) => classify_command_code(
            command_err.code,
            &command_err.message,
            username,
            database,
        ),
        _ => ProvisionError::Driver(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_user_exists_code_is_duplicate() {
        let err = classify_command_code(
            CODE_USER_EXISTS,
            "User \"ratingservice@ratingsdb\" already exists",
            "ratingservice",
            "ratingsdb",
        );
        assert!(matches!(
            err,
            ProvisionError::DuplicateUser { ref username, ref database }
                if username == "ratingservice" && database == "ratingsdb"
        ));
        assert_eq!(err.exit_code(), 73);
    }

    #[test]
    fn test_unauthorized_codes_are_authorization() {
        for code in [CODE_UNAUTHORIZED, CODE_AUTHENTICATION_FAILED] {
            let err = classify_command_code(code, "not authorized", "u", "db");
            assert!(matches!(err, ProvisionError::Authorization(_)));
            assert_eq!(err.exit_code(), 77);
        }
    }

    #[test]
    fn test_other_codes_keep_code() {
        let err = classify_command_code(2, "BadValue", "u", "db");
        assert!(matches!(err, ProvisionError::Command { code: 2, .. }));
        assert_eq!(err.phase(), "command");
    }

    #[test]
    fn test_exit_codes_are_distinct_per_failure_class() {
        let connection = ProvisionError::Connection("refused".to_string());
        let duplicate = ProvisionError::DuplicateUser {
            username: "u".to_string(),
            database: "db".to_string(),
        };
        let authorization = ProvisionError::Authorization("denied".to_string());
        let codes = [
            connection.exit_code(),
            duplicate.exit_code(),
            authorization.exit_code(),
        ];
        assert_eq!(codes, [69, 73, 77]);
    }

    #[test]
    fn test_duplicate_message_names_user_and_database() {
        let err = ProvisionError::DuplicateUser {
            username: "notificationservice".to_string(),
            database: "notificationsdb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "MongoDB user \"notificationservice\" already exists in database \"notificationsdb\""
        );
    }

    #[test]
    fn test_refused_connection_is_connection_error() {
        let driver_err = DriverError::from(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        let err = classify_driver_error(driver_err, "ratingservice", "ratingsdb");
        assert!(matches!(err, ProvisionError::Connection(_)));
        assert_eq!(err.exit_code(), 69);
        assert_eq!(err.phase(), "connect");
    }
}
