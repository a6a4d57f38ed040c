use crate::dto;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Name of the bearer session token scheme in the OpenAPI document
const SESSION_TOKEN_SCHEME: &str = "session_token";

struct SessionTokenAuth;

impl Modify for SessionTokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            SESSION_TOKEN_SCHEME,
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task Tracker API",
        description = "Tracks personal tasks with deadlines, pushes reminders for tasks due today, \
            and gives admins a panel for managing every account. Authenticate with the token \
            from POST /session as a bearer token."
    ),
    security(("session_token" = [])),
    modifiers(&SessionTokenAuth)
)]
struct TaskTrackerApi;

/// Constructs the route on the API that renders the swagger UI and returns the OpenAPI schema.
/// Merges in OpenAPI definitions from other locations in the app, such as the [dto] package
/// and submodules of [api][crate::api]
pub fn build_documentation() -> SwaggerUi {
    let mut api_docs = TaskTrackerApi::openapi();
    api_docs.merge(dto::OpenApiSchemas::openapi());
    api_docs.merge(super::session::SessionApi::openapi());
    api_docs.merge(super::user::UsersApi::openapi());
    api_docs.merge(super::todo::TaskApi::openapi());
    api_docs.merge(super::admin::AdminApi::openapi());

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_docs)
}
