use crate::api::auth::AuthenticatedUser;
use crate::domain::notification::driven_ports::PushTokenStore;
use crate::domain::notification::driving_ports::PushTokenPort;
use crate::domain::user::driven_ports::{UserReader, UserWriter};
use crate::domain::user::driving_ports::{UserError, UserPort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    BasicErrorResponse, GenericErrorResponse, Json, ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, put};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(
    paths(get_profile, update_profile, register_push_token, revoke_push_token),
    components(schemas(dto::PushTokenRegistration))
)]
/// Defines the OpenAPI documentation for the account page
pub struct UsersApi;
/// Constant used to group account endpoints in OpenAPI documentation
pub const USER_API_GROUP: &str = "Account";

/// Builds a router for the signed-in user's own account
pub fn user_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/users/me",
            get(
                async |State(app_state): AppState, AuthenticatedUser(session): AuthenticatedUser| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_reader = persistence::db_user_driven_ports::DbReadUsers {};

                    get_profile(&session.user_id, &mut ext_cxn, &user_service, &user_reader).await
                },
            )
            .patch(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Json(update): Json<dto::UpdateProfile>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_reader = persistence::db_user_driven_ports::DbReadUsers {};
                    let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};

                    update_profile(
                        &session.user_id,
                        update,
                        &mut ext_cxn,
                        &user_service,
                        &user_reader,
                        &user_writer,
                    )
                    .await
                },
            ),
        )
        .route(
            "/users/me/push-token",
            put(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Json(registration): Json<dto::PushTokenRegistration>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let token_service = domain::notification::PushTokenService {};
                    let token_store = persistence::db_push_token_driven_ports::DbPushTokens {};

                    register_push_token(
                        &session.user_id,
                        registration,
                        &mut ext_cxn,
                        &token_service,
                        &token_store,
                    )
                    .await
                },
            )
            .delete(
                async |State(app_state): AppState, AuthenticatedUser(session): AuthenticatedUser| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let token_service = domain::notification::PushTokenService {};
                    let token_store = persistence::db_push_token_driven_ports::DbPushTokens {};

                    revoke_push_token(&session.user_id, &mut ext_cxn, &token_service, &token_store)
                        .await
                },
            ),
        )
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = USER_API_GROUP,
    responses(
        (status = 200, description = "The signed-in user's profile", body = dto::UserProfile),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Retrieves the signed-in user's profile
async fn get_profile(
    user_id: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_reader: &impl UserReader,
) -> Result<Json<dto::UserProfile>, UserError> {
    let profile = user_service
        .get_profile(user_id, &mut *ext_cxn, user_reader)
        .await?;

    Ok(Json(profile.into()))
}

#[utoipa::path(
    patch,
    path = "/users/me",
    tag = USER_API_GROUP,
    request_body = dto::UpdateProfile,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Changes the name and email on the signed-in user's profile
async fn update_profile(
    user_id: &str,
    update: dto::UpdateProfile,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_reader: &impl UserReader,
    user_writer: &impl UserWriter,
) -> Result<StatusCode, ErrorResponse> {
    info!("Updating profile of user {user_id}");
    update.validate().map_err(ValidationErrorResponse::from)?;

    let domain_update = domain::user::UpdateProfile::from(update);
    user_service
        .update_profile(
            user_id,
            &domain_update,
            &mut *ext_cxn,
            user_reader,
            user_writer,
        )
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    put,
    path = "/users/me/push-token",
    tag = USER_API_GROUP,
    request_body = dto::PushTokenRegistration,
    responses(
        (status = 204, description = "Deadline notifications will be pushed to this token"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Grants notification permission by registering the device's push token
async fn register_push_token(
    user_id: &str,
    registration: dto::PushTokenRegistration,
    ext_cxn: &mut impl ExternalConnectivity,
    token_service: &impl PushTokenPort,
    token_store: &impl PushTokenStore,
) -> Result<StatusCode, ErrorResponse> {
    registration
        .validate()
        .map_err(ValidationErrorResponse::from)?;

    token_service
        .register(user_id, &registration.token, &mut *ext_cxn, token_store)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/users/me/push-token",
    tag = USER_API_GROUP,
    responses(
        (status = 204, description = "Deadline notifications will no longer be delivered"),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Revokes notification permission
async fn revoke_push_token(
    user_id: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    token_service: &impl PushTokenPort,
    token_store: &impl PushTokenStore,
) -> Result<StatusCode, GenericErrorResponse> {
    token_service
        .revoke(user_id, &mut *ext_cxn, token_store)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(StatusCode::NO_CONTENT)
}
