use crate::domain::admin::driving_ports::AdminError;
use crate::domain::session::{AuthFailure, FormError};
use crate::domain::session::driving_ports::SessionError;
use crate::domain::todo::driving_ports::TaskError;
use crate::domain::user::driving_ports::UserError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_macros::FromRequest;
use serde::Serialize;
use tracing::error;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{ToResponse, ToSchema, openapi};
use validator::ValidationErrors;

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToResponse)]
#[response(examples(
    ("Not Found" = (
        summary = "Entity could not be found (404)",
        value = json!({
            "error_code": "not_found",
            "error_description": "The requested entity could not be found.",
            "extra_info": null
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "error_code": "internal_error",
            "error_description": "Could not access data to complete your request",
            "extra_info": null
        })
    )),

    ("Invalid Input" = (
        summary = "Invalid request body was passed (400)",
        value = json!({
            "error_code": "invalid_input",
            "error_description": "Submitted data was invalid.",
            "extra_info": {
                "title": [
                    {
                        "code": "length",
                        "message": null,
                        "params": {
                            "value": "",
                            "min": 1
                        }
                    }
                ]
            }
        })
    )),

    ("Malformed JSON" = (
        summary = "Invalid JSON passed to server (400)",
        value = json!({
            "error_code": "invalid_json",
            "error_description": "The passed request body contained malformed or unreadable JSON.",
            "extra_info": "Failed to parse the request body as JSON: EOF while parsing an object at line 4 column 0"
        })
    )),

    ("Not Signed In" = (
        summary = "No valid session token was provided (401)",
        value = json!({
            "error_code": "unauthorized",
            "error_description": "You must sign in to do that.",
            "extra_info": { "redirect_to": "/" }
        })
    )),

    ("Authentication Failed" = (
        summary = "The identity provider rejected the credentials (401)",
        value = json!({
            "error_code": "auth_failed",
            "error_description": "Account does not exist. Please register first.",
            "extra_info": { "show_register_hint": true }
        })
    )),

    ("Forbidden" = (
        summary = "The caller is signed in but lacks the admin role (403)",
        value = json!({
            "error_code": "forbidden",
            "error_description": "Only admins may do that.",
            "extra_info": null
        })
    ))
))]
pub struct BasicErrorResponse {
    error_code: String,
    error_description: String,
    extra_info: Option<ExtraInfo>,
}

impl BasicErrorResponse {
    fn new(error_code: &str, error_description: &str, extra_info: Option<ExtraInfo>) -> Self {
        BasicErrorResponse {
            error_code: error_code.into(),
            error_description: error_description.into(),
            extra_info,
        }
    }

    fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    Message(String),
    Redirect { redirect_to: String },
    RegisterHint { show_register_hint: bool },
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// Wraps unexpected failures and turns them into a 500 without leaking details
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        BasicErrorResponse::new(
            "internal_error",
            "Could not access data to complete your request",
            None,
        )
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Response for an entity which doesn't exist, or which the caller isn't allowed to see
pub struct NotFoundResponse;

impl IntoResponse for NotFoundResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new(
            "not_found",
            "The requested entity could not be found.",
            None,
        )
        .with_status(StatusCode::NOT_FOUND)
    }
}

/// Response for requests without a live session. Clients should go back to the entry screen.
pub struct UnauthorizedResponse;

impl IntoResponse for UnauthorizedResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new(
            "unauthorized",
            "You must sign in to do that.",
            Some(ExtraInfo::Redirect {
                redirect_to: "/".into(),
            }),
        )
        .with_status(StatusCode::UNAUTHORIZED)
    }
}

pub struct ForbiddenResponse;

impl IntoResponse for ForbiddenResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new("forbidden", "Only admins may do that.", None)
            .with_status(StatusCode::FORBIDDEN)
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new(
            "invalid_input",
            "Submitted data was invalid.",
            Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
        )
        .with_status(StatusCode::BAD_REQUEST)
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        BasicErrorResponse::new("invalid_input", &self.to_string(), None)
            .with_status(StatusCode::BAD_REQUEST)
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        BasicErrorResponse::new(
            "auth_failed",
            &self.user_message(),
            Some(ExtraInfo::RegisterHint {
                show_register_hint: self.shows_register_hint(),
            }),
        )
        .with_status(StatusCode::UNAUTHORIZED)
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(form_err) => form_err.into_response(),
            Self::AuthFailed(failure) => failure.into_response(),
            Self::PortError(port_err) => GenericErrorResponse(port_err).into_response(),
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        match self {
            Self::TaskDoesNotExist => NotFoundResponse.into_response(),
            Self::PortError(port_err) => GenericErrorResponse(port_err).into_response(),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        match self {
            Self::UserDoesNotExist(_) => NotFoundResponse.into_response(),
            Self::PortError(port_err) => GenericErrorResponse(port_err).into_response(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => ForbiddenResponse.into_response(),
            Self::UserDoesNotExist(_) | Self::TaskDoesNotExist(_) => {
                NotFoundResponse.into_response()
            }
            Self::CascadeInterrupted {
                deleted_tasks,
                cause,
            } => {
                error!(
                    "Cascade delete interrupted after {} task(s): {cause:#}",
                    deleted_tasks.len()
                );
                BasicErrorResponse::new(
                    "internal_error",
                    "The user could not be fully deleted.",
                    Some(ExtraInfo::Message(format!(
                        "Deleted {} task(s) before failing",
                        deleted_tasks.len()
                    ))),
                )
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::CascadeRolledBack(cause) => {
                error!("Cascade delete rolled back: {cause:#}");
                BasicErrorResponse::new(
                    "internal_error",
                    "The user could not be deleted.",
                    Some(ExtraInfo::Message("Nothing was deleted".to_owned())),
                )
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::PortError(port_err) => GenericErrorResponse(port_err).into_response(),
        }
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new(
            "invalid_json",
            "The passed request body contained malformed or unreadable JSON.",
            Some(ExtraInfo::Message(self.parse_problem)),
        )
        .with_status(StatusCode::BAD_REQUEST)
    }
}
