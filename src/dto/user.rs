use crate::domain;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// DTO for a user's profile as shown on the account page
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct UserProfile {
    #[schema(example = "k2Hq9sJd0fT1")]
    pub id: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "female")]
    pub gender: String,
    #[schema(example = "University of London")]
    pub institution: String,
    #[schema(example = "user")]
    pub role: String,
}

impl From<domain::user::TrackerUser> for UserProfile {
    fn from(value: domain::user::TrackerUser) -> Self {
        UserProfile {
            id: value.id,
            name: value.name,
            email: value.email,
            gender: value.gender,
            institution: value.institution,
            role: value.role.to_string(),
        }
    }
}

/// DTO for editing the name and email on a profile
#[derive(Deserialize, Validate, ToSchema, Debug)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Ada King")]
    pub name: String,
    #[validate(email)]
    #[schema(example = "ada.king@example.com")]
    pub email: String,
}

impl From<UpdateProfile> for domain::user::UpdateProfile {
    fn from(value: UpdateProfile) -> Self {
        domain::user::UpdateProfile {
            name: value.name,
            email: value.email,
        }
    }
}

/// DTO carrying the device token deadline notifications should be pushed to
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct PushTokenRegistration {
    #[validate(length(min = 1))]
    pub token: String,
}
