use crate::domain::session::SessionRegistry;
use crate::domain::task_feed::NotificationPolicy;
use crate::remote::identity_toolkit::IdentityToolkit;
use axum::Router;
use axum::extract::State;
use std::sync::Arc;

pub mod api;
pub mod app_env;
pub mod config;
pub mod db;
pub mod domain;
pub mod dto;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod remote;
pub mod routing_utils;

/// Everything request handlers share for the lifetime of the server
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub sessions: SessionRegistry,
    pub identity_provider: IdentityToolkit,
    pub push_gateway_url: Option<String>,
    pub notification_policy: NotificationPolicy,
}

pub type AppState = State<Arc<SharedData>>;

/// Assembles every route group, the swagger UI, and request tracing
pub fn build_router(shared_data: Arc<SharedData>) -> Router {
    let router = Router::new()
        .merge(api::session::session_routes())
        .merge(api::user::user_routes())
        .merge(api::todo::task_routes())
        .merge(api::admin::admin_routes())
        .merge(api::swagger_main::build_documentation())
        .with_state(shared_data);

    logging::attach_tracing_http(router)
}
