use crate::domain::user::driving_ports::{UserError, UserPort};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};

/// Permission level of a user. New registrations always get [Role::User].
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// A user's profile as kept in the profile store. The ID is assigned by the identity provider.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TrackerUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub gender: String,
    pub institution: String,
    pub role: Role,
}

impl TrackerUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Profile fields collected at registration
#[derive(Debug)]
#[cfg_attr(test, derive(Clone))]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub gender: String,
    pub institution: String,
}

/// Fields a user (or an admin) may change on an existing profile
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct UpdateProfile {
    pub name: String,
    pub email: String,
}

pub mod driven_ports {
    use super::*;

    pub trait UserReader {
        async fn get_all(
            &self,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TrackerUser>, anyhow::Error>;
        async fn get_by_id(
            &self,
            id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<TrackerUser>, anyhow::Error>;
    }

    pub trait UserWriter {
        /// Stores a profile for an identity that was just registered. Always uses [Role::User].
        async fn create_user(
            &self,
            id: &str,
            user: &CreateUser,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn update_profile(
            &self,
            id: &str,
            update: &UpdateProfile,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// Sets the role on a profile, creating an otherwise-empty profile if none exists yet
        async fn set_role(
            &self,
            id: &str,
            role: Role,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn delete_user(
            &self,
            id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum UserError {
        #[error("user {0} does not exist")]
        UserDoesNotExist(String),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[cfg(test)]
    #[allow(clippy::items_after_test_module)]
    mod user_error_clone {
        use super::UserError;
        use anyhow::anyhow;

        impl Clone for UserError {
            fn clone(&self) -> Self {
                match self {
                    Self::UserDoesNotExist(id) => Self::UserDoesNotExist(id.clone()),
                    Self::PortError(err) => Self::PortError(anyhow!(format!("{}", err))),
                }
            }
        }
    }

    pub trait UserPort {
        async fn get_profile(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<TrackerUser, UserError>;
        async fn update_profile(
            &self,
            user_id: &str,
            update: &UpdateProfile,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
            u_writer: &impl driven_ports::UserWriter,
        ) -> Result<(), UserError>;
        async fn is_admin(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<bool, anyhow::Error>;
        async fn promote_to_admin(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_writer: &impl driven_ports::UserWriter,
        ) -> Result<(), anyhow::Error>;
    }
}

pub struct UserService {}

impl driving_ports::UserPort for UserService {
    async fn get_profile(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<TrackerUser, UserError> {
        let user = u_reader
            .get_by_id(user_id, &mut *ext_cxn)
            .await
            .context("fetching a user profile")?;

        user.ok_or_else(|| UserError::UserDoesNotExist(user_id.to_owned()))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateProfile,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
        u_writer: &impl driven_ports::UserWriter,
    ) -> Result<(), UserError> {
        self.get_profile(user_id, &mut *ext_cxn, u_reader).await?;
        u_writer
            .update_profile(user_id, update, &mut *ext_cxn)
            .await
            .context("updating a user profile")?;

        info!("Profile for user {user_id} updated");
        Ok(())
    }

    async fn is_admin(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<bool, anyhow::Error> {
        let user = u_reader.get_by_id(user_id, &mut *ext_cxn).await;
        if let Err(ref port_err) = user {
            error!("Role lookup failure for user {user_id}: {port_err}");
        }

        Ok(user
            .context("looking up a user's role")?
            .is_some_and(|user| user.is_admin()))
    }

    async fn promote_to_admin(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_writer: &impl driven_ports::UserWriter,
    ) -> Result<(), anyhow::Error> {
        u_writer
            .set_role(user_id, Role::Admin, &mut *ext_cxn)
            .await
            .context("assigning the admin role")?;

        info!("User {user_id} is now an admin");
        Ok(())
    }
}
