use crate::SharedData;
use crate::domain::session::SessionRegistry;
use crate::domain::task_feed::NotificationPolicy;
use crate::persistence;
use crate::remote::identity_toolkit::IdentityToolkit;
use axum::body;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

/// Used in tests to both extract the raw bytes from the HTTP response body and then deserialize them into the
/// requested type. Will panic and fail the test if either step fails somehow.
pub async fn deserialize_body<T: DeserializeOwned>(response_body: body::Body) -> T {
    let bytes = body::to_bytes(response_body, usize::MAX)
        .await
        .expect("Could not read data from response body!");

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "Could not parse body content into data structure! Error: {}, Received body: {:?}",
            err, bytes
        )
    })
}

/// Mirror of the error body every failing route returns
#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub error_code: String,
    pub error_description: String,
    pub extra_info: Option<serde_json::Value>,
}

/// Asserts on a response's status and returns its error body
pub async fn expect_error(response: Response, status: StatusCode) -> ErrorBody {
    assert_eq!(status, response.status());
    deserialize_body(response.into_body()).await
}

/// Shared state whose database pool never connects, for exercising routing and extractors
pub fn unconnected_state() -> Arc<SharedData> {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:9/unused")
        .expect("lazy pool could not be built");
    let ext_cxn = persistence::ExternalConnectivity::new(pool).expect("http client did not build");

    Arc::new(SharedData {
        ext_cxn,
        sessions: SessionRegistry::new(),
        identity_provider: IdentityToolkit::new("http://127.0.0.1:9", "test-key"),
        push_gateway_url: None,
        notification_policy: NotificationPolicy::EverySnapshot,
    })
}
