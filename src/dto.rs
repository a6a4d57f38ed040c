pub mod admin;
pub mod session;
pub mod task;
pub mod user;

pub use admin::*;
pub use session::*;
pub use task::*;
pub use user::*;

use utoipa::OpenApi;

/// Schemas shared by several groups of routes
#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            TaskResponse,
            TaskStatus,
            UserProfile,
            UpdateProfile,
            crate::routing_utils::ExtraInfo,
        ),
        responses(crate::routing_utils::BasicErrorResponse),
    )
)]
pub struct OpenApiSchemas;
