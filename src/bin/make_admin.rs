//! Grants the admin role to an existing account: `make_admin <user-id>`.
//! The ID is the one the identity provider assigned when the account registered.

use anyhow::{Context, bail};
use task_tracker::domain::user::UserService;
use task_tracker::domain::user::driving_ports::UserPort;
use task_tracker::persistence::db_user_driven_ports::DbWriteUsers;
use task_tracker::{app_env, db, logging, persistence};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    logging::setup_logging_and_tracing(logging::init_env_filter()?, None);

    let mut args = std::env::args().skip(1);
    let (Some(user_id), None) = (args.next(), args.next()) else {
        bail!("usage: make_admin <user-id>");
    };
    let db_url = std::env::var(app_env::DB_URL)
        .with_context(|| format!("{} must be set", app_env::DB_URL))?;

    let pool = db::connect_sqlx(&db_url).await?;
    let mut ext_cxn = persistence::ExternalConnectivity::new(pool)?;

    UserService {}
        .promote_to_admin(&user_id, &mut ext_cxn, &DbWriteUsers {})
        .await?;
    info!("User {user_id} is now an admin");

    Ok(())
}
