//! MongoDB-backed user administration
//!
//! Uses `createUser`, `updateUser` and `usersInfo` database commands, each
//! run against the request's target database.

use super::{ExistingUser, UserAdmin};
use crate::error::{classify_driver_error, ProvisionError};
use crate::request::{RoleGrant, Secret};
use mongodb::bson::{self, doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Application name reported to the server.
const APP_NAME: &str = "mongo-init";

#[derive(Deserialize)]
struct UsersInfoReply {
    users: Vec<UserInfo>,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    roles: Vec<RoleGrant>,
}

/// Connection to a MongoDB server with user-administration privileges.
pub struct MongoAdmin {
    client: Client,
}

impl MongoAdmin {
    /// Build a client for `uri`.
    ///
    /// The driver connects lazily; call [`UserAdmin::ping`] to surface an
    /// unreachable server before submitting requests.
    pub async fn connect(
        uri: &str,
        server_selection_timeout: Duration,
    ) -> Result<Self, ProvisionError> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            if let ErrorKind::InvalidArgument { message, .. } = e.kind.as_ref() {
                return ProvisionError::Config(format!("Invalid MongoDB URI: {}", message));
            }
            classify_driver_error(e, "", "admin")
        })?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(server_selection_timeout);

        let client = Client::with_options(options)
            .map_err(|e| ProvisionError::Config(format!("Invalid client options: {}", e)))?;

        Ok(Self { client })
    }

    async fn run(
        &self,
        database: &str,
        username: &str,
        command: Document,
    ) -> Result<Document, ProvisionError> {
        self.client
            .database(database)
            .run_command(command)
            .await
            .map_err(|e| classify_driver_error(e, username, database))
    }
}

fn role_documents(roles: &[RoleGrant]) -> Vec<Document> {
    roles
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
        .collect()
}

impl UserAdmin for MongoAdmin {
    async fn ping(&self) -> Result<(), ProvisionError> {
        self.run("admin", "", doc! { "ping": 1 }).await?;
        debug!("MongoDB reachable");
        Ok(())
    }

    async fn find_user(
        &self,
        database: &str,
        username: &str,
    ) -> Result<Option<ExistingUser>, ProvisionError> {
        let reply = self
            .run(
                database,
                username,
                doc! { "usersInfo": { "user": username, "db": database } },
            )
            .await?;

        let reply: UsersInfoReply = bson::from_document(reply)
            .map_err(|e| ProvisionError::Driver(format!("Unexpected usersInfo reply: {}", e)))?;

        Ok(reply
            .users
            .into_iter()
            .next()
            .map(|user| ExistingUser { roles: user.roles }))
    }

    async fn create_user(
        &self,
        database: &str,
        username: &str,
        password: &Secret,
        roles: &[RoleGrant],
    ) -> Result<(), ProvisionError> {
        self.run(
            database,
            username,
            doc! {
                "createUser": username,
                "pwd": password.expose(),
                "roles": role_documents(roles),
            },
        )
        .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        database: &str,
        username: &str,
        password: &Secret,
        roles: &[RoleGrant],
    ) -> Result<(), ProvisionError> {
        self.run(
            database,
            username,
            doc! {
                "updateUser": username,
                "pwd": password.expose(),
                "roles": role_documents(roles),
            },
        )
        .await?;
        Ok(())
    }
}
