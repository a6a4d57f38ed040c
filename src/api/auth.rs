use crate::SharedData;
use crate::logging;
use crate::domain::session::Session;
use crate::routing_utils::UnauthorizedResponse;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use std::sync::Arc;
use tracing::debug;

/// Extracts the open session named by the request's `Authorization: Bearer` token.
/// Requests without a live session are rejected with a redirect back to the entry screen.
pub struct AuthenticatedUser(pub Session);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<SharedData>> for AuthenticatedUser {
    type Rejection = UnauthorizedResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<SharedData>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            debug!("Request had no bearer token");
            return Err(UnauthorizedResponse);
        };

        match state.sessions.resolve(token) {
            Some(session) => {
                logging::record_user(&session.user_id);
                Ok(AuthenticatedUser(session))
            }
            None => {
                debug!("Request used an unknown or closed session");
                Err(UnauthorizedResponse)
            }
        }
    }
}
