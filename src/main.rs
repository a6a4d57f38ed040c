use anyhow::Context;
use std::sync::Arc;
use task_tracker::config::Config;
use task_tracker::domain::session::SessionRegistry;
use task_tracker::remote::identity_toolkit::IdentityToolkit;
use task_tracker::{SharedData, build_router, db, logging, persistence};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    let config = Config::load().context("loading configuration")?;

    let otel_exporters = match config.otel {
        Some(ref endpoints) => Some(logging::init_exporters(endpoints)?),
        None => None,
    };
    logging::setup_logging_and_tracing(logging::init_env_filter()?, otel_exporters);
    config.log_defaults();
    if config.otel.is_none() {
        warn!("OpenTelemetry endpoints not configured, only logging to stdout");
    }
    if config.push_gateway_url.is_none() {
        warn!("No push gateway configured, deadline notifications will be dropped");
    }

    let pool = db::connect_sqlx(&config.database_url).await?;
    let shared_data = Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(pool)?,
        sessions: SessionRegistry::with_idle_timeout(config.session_idle_timeout),
        identity_provider: IdentityToolkit::new(
            &config.identity_provider_url,
            &config.identity_provider_api_key,
        ),
        push_gateway_url: config.push_gateway_url.clone(),
        notification_policy: config.notification_policy,
    });

    let router = build_router(shared_data);
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding to port {}", config.port))?;

    info!(
        "Task tracker listening on port {} with {} deadline notifications",
        config.port, config.notification_policy
    );
    axum::serve(listener, router)
        .await
        .context("serving HTTP requests")?;

    Ok(())
}
