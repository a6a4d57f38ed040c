use crate::domain;
use crate::domain::session::{AuthFailure, Identity};
use crate::external_connections::ExternalConnectivity;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Client for an identity provider speaking the Identity Toolkit REST protocol
/// (`accounts:signInWithPassword` / `accounts:signUp`)
pub struct IdentityToolkit {
    base_url: String,
    api_key: String,
}

impl IdentityToolkit {
    pub fn new(base_url: &str, api_key: &str) -> IdentityToolkit {
        IdentityToolkit {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1/accounts:{action}?key={}", self.base_url, self.api_key)
    }

    async fn password_request(
        &self,
        action: &str,
        email: &str,
        password: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Identity, AuthFailure> {
        debug!("Calling identity provider action {action}");
        let response = ext_cxn
            .http_client()
            .post(self.endpoint(action))
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status().is_success() {
            let account: AccountResponse = response.json().await.map_err(|err| {
                warn!("Identity provider sent an unreadable account: {err}");
                AuthFailure::Other(err.to_string())
            })?;

            return Ok(Identity {
                user_id: account.local_id,
            });
        }

        let status = response.status();
        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => Err(classify_error_message(&envelope.error.message)),
            Err(_) => Err(AuthFailure::Other(format!(
                "identity provider responded with {status}"
            ))),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Error messages look like `CODE` or `CODE : human readable detail`
fn classify_error_message(message: &str) -> AuthFailure {
    let code = message.split(" : ").next().unwrap_or(message).trim();
    match code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthFailure::AccountNotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_CREDENTIAL" => {
            AuthFailure::InvalidCredential
        }
        _ => AuthFailure::Other(message.to_owned()),
    }
}

fn classify_transport_error(err: reqwest_middleware::Error) -> AuthFailure {
    match err {
        reqwest_middleware::Error::Reqwest(ref req_err)
            if req_err.is_connect() || req_err.is_timeout() =>
        {
            warn!("Identity provider unreachable: {req_err}");
            AuthFailure::NetworkFailure
        }
        other => AuthFailure::Other(other.to_string()),
    }
}

impl domain::session::driven_ports::IdentityProvider for IdentityToolkit {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Identity, AuthFailure> {
        self.password_request("signInWithPassword", email, password, ext_cxn)
            .await
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Identity, AuthFailure> {
        self.password_request("signUp", email, password, ext_cxn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::driven_ports::IdentityProvider;
    use crate::external_connections::test_util::FakeExternalConnectivity;

    #[test]
    fn error_codes_map_to_failures() {
        assert_eq!(
            AuthFailure::AccountNotFound,
            classify_error_message("EMAIL_NOT_FOUND")
        );
        assert_eq!(
            AuthFailure::InvalidCredential,
            classify_error_message("INVALID_LOGIN_CREDENTIALS")
        );
        assert_eq!(
            AuthFailure::InvalidCredential,
            classify_error_message("INVALID_PASSWORD : The password is invalid.")
        );
        assert_eq!(
            AuthFailure::Other("TOO_MANY_ATTEMPTS_TRY_LATER : Try again later.".to_owned()),
            classify_error_message("TOO_MANY_ATTEMPTS_TRY_LATER : Try again later.")
        );
    }

    #[test]
    fn endpoints_carry_the_api_key() {
        let toolkit = IdentityToolkit::new("https://identity.example.com/", "k3y");

        assert_eq!(
            "https://identity.example.com/v1/accounts:signUp?key=k3y",
            toolkit.endpoint("signUp")
        );
    }

    #[test]
    fn error_envelope_parses() {
        let envelope: ErrorEnvelope = serde_json::from_str(
            r#"{"error": {"code": 400, "message": "EMAIL_NOT_FOUND", "errors": []}}"#,
        )
        .expect("envelope did not parse");

        assert_eq!("EMAIL_NOT_FOUND", envelope.error.message);
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_failure() {
        // Nothing listens on port 9 of the loopback interface, so the connection is refused
        let toolkit = IdentityToolkit::new("http://127.0.0.1:9", "k3y");
        let mut ext_cxn = FakeExternalConnectivity::new();

        let sign_in = toolkit
            .sign_in("ada@example.com", "abc123", &mut ext_cxn)
            .await;
        assert_eq!(Err(AuthFailure::NetworkFailure), sign_in);
    }
}
