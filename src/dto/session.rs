use crate::domain;
use crate::domain::session::{AuthMode, CredentialForm, Route};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Serialize, ToSchema, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeDto {
    #[display("sign-in")]
    SignIn,
    #[display("registration")]
    Register,
}

impl From<AuthModeDto> for AuthMode {
    fn from(value: AuthModeDto) -> Self {
        match value {
            AuthModeDto::SignIn => AuthMode::SignIn,
            AuthModeDto::Register => AuthMode::Register,
        }
    }
}

/// DTO for the combined sign-in/registration form. The profile fields are only
/// required when registering. Checked by the session service rather than `validator`
/// so the form gets the same messages everywhere.
#[derive(Deserialize, Display, ToSchema)]
#[display("{mode} request for {email}")]
#[cfg_attr(test, derive(Serialize))]
pub struct SessionRequest {
    pub mode: AuthModeDto,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "abc123")]
    pub password: String,
    #[serde(default)]
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[serde(default)]
    #[schema(example = "female")]
    pub gender: String,
    #[serde(default)]
    #[schema(example = "University of London")]
    pub institution: String,
}

impl SessionRequest {
    pub fn into_form(self) -> (AuthMode, CredentialForm) {
        (
            self.mode.into(),
            CredentialForm {
                email: self.email,
                password: self.password,
                name: self.name,
                gender: self.gender,
                institution: self.institution,
            },
        )
    }
}

/// DTO returned when a session opens. The token goes in the `Authorization: Bearer` header.
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct SessionCreated {
    #[schema(example = "6f1c2b4e9d7a4c3b8e2f1a0b9c8d7e6f")]
    pub token: String,
    #[schema(example = "k2Hq9sJd0fT1")]
    pub user_id: String,
    #[schema(example = "/dashboard")]
    pub route: String,
}

impl From<domain::session::Session> for SessionCreated {
    fn from(value: domain::session::Session) -> Self {
        SessionCreated {
            route: domain::session::route_for(Some(&value)).path().to_owned(),
            token: value.token,
            user_id: value.user_id,
        }
    }
}

/// DTO describing where the client belongs given its current session
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct SessionStatus {
    #[schema(example = "/dashboard")]
    pub route: String,
    pub user_id: Option<String>,
    pub is_admin: bool,
}

/// DTO returned after signing out
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct SignedOut {
    #[schema(example = "/")]
    pub route: String,
}

impl From<Route> for SignedOut {
    fn from(value: Route) -> Self {
        SignedOut {
            route: value.path().to_owned(),
        }
    }
}
