use crate::domain;
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use sqlx::{query, query_scalar};

pub struct DbPushTokens {}

impl domain::notification::driven_ports::PushTokenStore for DbPushTokens {
    async fn get_token(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<String>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let token = query_scalar::<_, String>("SELECT token FROM push_token WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(cxn.borrow_connection())
            .await
            .context("Fetching a push token")?;

        Ok(token)
    }

    async fn save_token(
        &self,
        user_id: &str,
        token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query(
            "INSERT INTO push_token(user_id, token) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET token = EXCLUDED.token, registered_at = now()",
        )
        .bind(user_id)
        .bind(token)
        .execute(cxn.borrow_connection())
        .await
        .context("Saving a push token")?;

        Ok(())
    }

    async fn remove_token(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("DELETE FROM push_token WHERE user_id = $1")
            .bind(user_id)
            .execute(cxn.borrow_connection())
            .await
            .context("Removing a push token")?;

        Ok(())
    }
}
