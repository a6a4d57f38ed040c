use crate::api::auth::AuthenticatedUser;
use crate::domain::session::driven_ports::IdentityProvider;
use crate::domain::session::driving_ports::{SessionError, SessionPort};
use crate::domain::session::{Session, SessionRegistry, route_for};
use crate::domain::user::driven_ports::{UserReader, UserWriter};
use crate::domain::user::driving_ports::UserPort;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{BasicErrorResponse, GenericErrorResponse, Json};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::get;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(open_session, session_status, close_session),
    components(schemas(
        dto::SessionRequest,
        dto::AuthModeDto,
        dto::SessionCreated,
        dto::SessionStatus,
        dto::SignedOut
    ))
)]
/// Defines the OpenAPI documentation for signing in, registering, and signing out
pub struct SessionApi;
/// Constant used to group session endpoints in OpenAPI documentation
pub const SESSION_API_GROUP: &str = "Sessions";

/// Builds a router for the "/session" routes
pub fn session_routes() -> Router<Arc<SharedData>> {
    Router::new().route(
        "/session",
        get(
            async |State(app_state): AppState, session: Option<AuthenticatedUser>| {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let user_service = domain::user::UserService {};
                let user_reader = persistence::db_user_driven_ports::DbReadUsers {};

                session_status(
                    session.map(|AuthenticatedUser(session)| session),
                    &mut ext_cxn,
                    &user_service,
                    &user_reader,
                )
                .await
            },
        )
        .post(
            async |State(app_state): AppState, Json(request): Json<dto::SessionRequest>| {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let session_service = domain::session::SessionService {};
                let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};

                open_session(
                    request,
                    &mut ext_cxn,
                    &app_state.sessions,
                    &session_service,
                    &app_state.identity_provider,
                    &user_writer,
                )
                .await
            },
        )
        .delete(
            async |State(app_state): AppState, AuthenticatedUser(session): AuthenticatedUser| {
                let session_service = domain::session::SessionService {};

                close_session(&session, &app_state.sessions, &session_service)
            },
        ),
    )
}

#[utoipa::path(
    post,
    path = "/session",
    tag = SESSION_API_GROUP,
    request_body = dto::SessionRequest,
    responses(
        (status = 201, description = "Signed in or registered", body = dto::SessionCreated),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Signs in or registers depending on the requested mode, then opens a session
async fn open_session(
    request: dto::SessionRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    sessions: &SessionRegistry,
    session_service: &impl SessionPort,
    identity_provider: &impl IdentityProvider,
    user_writer: &impl UserWriter,
) -> Result<(StatusCode, Json<dto::SessionCreated>), SessionError> {
    info!("Received {request}");
    let (mode, form) = request.into_form();

    let session = session_service
        .submit(
            mode,
            &form,
            &mut *ext_cxn,
            sessions,
            identity_provider,
            user_writer,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = SESSION_API_GROUP,
    responses(
        (status = 200, description = "Where the client belongs right now", body = dto::SessionStatus),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Tells the client which screen it should be on. Never fails for a missing session.
async fn session_status(
    session: Option<Session>,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_reader: &impl UserReader,
) -> Result<Json<dto::SessionStatus>, ErrorResponse> {
    let route = route_for(session.as_ref());
    let Some(session) = session else {
        return Ok(Json(dto::SessionStatus {
            route: route.path().to_owned(),
            user_id: None,
            is_admin: false,
        }));
    };

    let is_admin = user_service
        .is_admin(&session.user_id, &mut *ext_cxn, user_reader)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(dto::SessionStatus {
        route: route.path().to_owned(),
        user_id: Some(session.user_id),
        is_admin,
    }))
}

#[utoipa::path(
    delete,
    path = "/session",
    tag = SESSION_API_GROUP,
    responses(
        (status = 200, description = "Session closed", body = dto::SignedOut),
        (status = 401, response = BasicErrorResponse),
    ),
)]
/// Closes the caller's session, which also ends any live task feed bound to it
fn close_session(
    session: &Session,
    sessions: &SessionRegistry,
    session_service: &impl SessionPort,
) -> Json<dto::SignedOut> {
    info!("Signing out user {}", session.user_id);
    Json(session_service.sign_out(&session.token, sessions).into())
}
