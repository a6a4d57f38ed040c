use crate::domain;
use crate::domain::user::{CreateUser, Role, TrackerUser, UpdateProfile};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error, bail};
use sqlx::{query, query_as};

pub struct DbReadUsers {}

#[derive(sqlx::FromRow)]
struct TrackerUserRow {
    id: String,
    name: String,
    email: String,
    gender: String,
    institution: String,
    role: String,
}

impl TryFrom<TrackerUserRow> for TrackerUser {
    type Error = anyhow::Error;

    fn try_from(value: TrackerUserRow) -> Result<Self, Self::Error> {
        Ok(TrackerUser {
            role: value
                .role
                .parse::<Role>()
                .with_context(|| format!("reading the role of user {}", value.id))?,
            id: value.id,
            name: value.name,
            email: value.email,
            gender: value.gender,
            institution: value.institution,
        })
    }
}

impl domain::user::driven_ports::UserReader for DbReadUsers {
    async fn get_all(
        &self,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<TrackerUser>, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        query_as::<_, TrackerUserRow>("SELECT * FROM tracker_user ORDER BY name, id")
            .fetch_all(connection.borrow_connection())
            .await
            .context("Fetching all users")?
            .into_iter()
            .map(TrackerUser::try_from)
            .collect()
    }

    async fn get_by_id(
        &self,
        id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<TrackerUser>, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let user = query_as::<_, TrackerUserRow>("SELECT * FROM tracker_user tu WHERE tu.id = $1")
            .bind(id)
            .fetch_optional(cxn_handle.borrow_connection())
            .await
            .context("Fetching a user by id")?;

        user.map(TrackerUser::try_from).transpose()
    }
}

pub struct DbWriteUsers {}

impl domain::user::driven_ports::UserWriter for DbWriteUsers {
    async fn create_user(
        &self,
        id: &str,
        user: &CreateUser,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        query(
            "INSERT INTO tracker_user(id, name, email, gender, institution, role) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.gender)
        .bind(&user.institution)
        .bind(Role::User.as_str())
        .execute(cxn_handle.borrow_connection())
        .await
        .context("Inserting new user")?;

        Ok(())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &UpdateProfile,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        query("UPDATE tracker_user SET name = $1, email = $2 WHERE id = $3")
            .bind(&update.name)
            .bind(&update.email)
            .bind(id)
            .execute(cxn_handle.borrow_connection())
            .await
            .context("Updating a user's profile")?;

        Ok(())
    }

    async fn set_role(
        &self,
        id: &str,
        role: Role,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        query(
            "INSERT INTO tracker_user(id, role) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(cxn_handle.borrow_connection())
        .await
        .context("Setting a user's role")?;

        Ok(())
    }

    async fn delete_user(
        &self,
        id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let deleted = query("DELETE FROM tracker_user WHERE id = $1")
            .bind(id)
            .execute(cxn_handle.borrow_connection())
            .await
            .context("Deleting a user")?;
        if deleted.rows_affected() == 0 {
            bail!("user {id} was already gone");
        }

        Ok(())
    }
}
