use crate::domain::session::driven_ports::IdentityProvider;
use crate::domain::user::CreateUser;
use crate::domain::user::driven_ports::UserWriter;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$").expect("email regex is valid")
});

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    Register,
}

/// Everything the sign-in/registration form collects. Profile fields are ignored when signing in.
#[derive(Debug, Clone, Default)]
pub struct CredentialForm {
    pub email: String,
    pub password: String,
    pub name: String,
    pub gender: String,
    pub institution: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Email and Password are required.")]
    MissingCredentials,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long and contain a number.")]
    WeakPassword,
    #[error("All fields are required for registration.")]
    MissingRegistrationFields,
}

/// Checks the form the same way regardless of who calls it, returning the first problem found.
/// Nothing is sent to the identity provider unless this passes.
pub fn validate_form(mode: AuthMode, form: &CredentialForm) -> Result<(), FormError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(FormError::MissingCredentials);
    }

    if !EMAIL_SHAPE.is_match(&form.email) {
        return Err(FormError::InvalidEmail);
    }

    if !is_strong_password(&form.password) {
        return Err(FormError::WeakPassword);
    }

    if mode == AuthMode::Register
        && (form.name.is_empty() || form.gender.is_empty() || form.institution.is_empty())
    {
        return Err(FormError::MissingRegistrationFields);
    }

    Ok(())
}

fn is_strong_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// An identity confirmed by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// The kinds of authentication failure users are told about
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Account does not exist. Please register first.")]
    AccountNotFound,
    #[error("Account does not exist. Please register first")]
    InvalidCredential,
    #[error("Please check your network and try again")]
    NetworkFailure,
    #[error("Error: {0}")]
    Other(String),
}

impl AuthFailure {
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether the user should be pointed toward registering instead
    pub fn shows_register_hint(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

pub mod driven_ports {
    use super::*;

    /// Stores and verifies credentials. Implementations classify every failure, including
    /// transport problems, into an [AuthFailure].
    pub trait IdentityProvider {
        async fn sign_in(
            &self,
            email: &str,
            password: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Identity, AuthFailure>;
        async fn register(
            &self,
            email: &str,
            password: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Identity, AuthFailure>;
    }
}

/// An authenticated session. Cloning shares the same end signal.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    ended: watch::Receiver<bool>,
}

impl Session {
    /// Resolves once the session is closed. Hand this to anything that must stop on sign-out.
    pub fn end_signal(&self) -> watch::Receiver<bool> {
        self.ended.clone()
    }
}

/// Completes when the session behind the receiver is closed or the registry forgets it
pub async fn session_ended(mut ended: watch::Receiver<bool>) {
    // An error means the sender is gone, which also ends the session
    let _ = ended.wait_for(|ended| *ended).await;
}

/// How long a session may go unused before it is closed. Live feeds don't count as use.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

struct OpenSession {
    user_id: String,
    ended: watch::Sender<bool>,
    last_used: Instant,
}

impl OpenSession {
    fn end(&self) {
        self.ended.send_replace(true);
    }
}

/// Open sessions keyed by their bearer token. A session that is not resolved for longer
/// than the idle timeout is closed like a sign-out, which also ends every feed bound to it.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, OpenSession>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> SessionRegistry {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn open(&self, user_id: &str) -> Session {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let (ended_tx, ended_rx) = watch::channel(false);
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");

        sessions.retain(|_, open| {
            let idle = now.duration_since(open.last_used) >= self.idle_timeout;
            if idle {
                open.end();
            }
            !idle
        });
        sessions.insert(
            token.clone(),
            OpenSession {
                user_id: user_id.to_owned(),
                ended: ended_tx,
                last_used: now,
            },
        );

        Session {
            token,
            user_id: user_id.to_owned(),
            ended: ended_rx,
        }
    }

    /// Looks up a live session and marks it used. An idle session is closed instead.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
        let open = sessions.get_mut(token)?;

        if now.duration_since(open.last_used) >= self.idle_timeout {
            debug!("Session for user {} expired", open.user_id);
            open.end();
            sessions.remove(token);
            return None;
        }
        open.last_used = now;

        Some(Session {
            token: token.to_owned(),
            user_id: open.user_id.clone(),
            ended: open.ended.subscribe(),
        })
    }

    /// Closes the session and signals everything bound to it. Returns false if the token was unknown.
    pub fn close(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
        match sessions.remove(token) {
            Some(open) => {
                open.end();
                true
            }
            None => false,
        }
    }

    pub fn open_count(&self) -> usize {
        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .len()
    }
}

/// Where a client should be, given its authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Entry,
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Entry => "/",
            Self::Dashboard => "/dashboard",
        }
    }
}

pub fn route_for(session: Option<&Session>) -> Route {
    match session {
        Some(_) => Route::Dashboard,
        None => Route::Entry,
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum SessionError {
        #[error(transparent)]
        Invalid(#[from] FormError),
        #[error(transparent)]
        AuthFailed(#[from] AuthFailure),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    pub trait SessionPort {
        /// Validates the form, then signs in or registers. Registration also stores a profile
        /// with the regular user role. Opens a session on success.
        async fn submit(
            &self,
            mode: AuthMode,
            form: &CredentialForm,
            ext_cxn: &mut impl ExternalConnectivity,
            sessions: &SessionRegistry,
            identity_provider: &impl driven_ports::IdentityProvider,
            u_writer: &impl UserWriter,
        ) -> Result<Session, SessionError>;

        /// Closes the session and returns where the client should go next
        fn sign_out(&self, token: &str, sessions: &SessionRegistry) -> Route;
    }
}

pub struct SessionService {}

impl driving_ports::SessionPort for SessionService {
    async fn submit(
        &self,
        mode: AuthMode,
        form: &CredentialForm,
        ext_cxn: &mut impl ExternalConnectivity,
        sessions: &SessionRegistry,
        identity_provider: &impl IdentityProvider,
        u_writer: &impl UserWriter,
    ) -> Result<Session, driving_ports::SessionError> {
        validate_form(mode, form)?;

        let identity = match mode {
            AuthMode::SignIn => {
                identity_provider
                    .sign_in(&form.email, &form.password, &mut *ext_cxn)
                    .await
            }
            AuthMode::Register => {
                identity_provider
                    .register(&form.email, &form.password, &mut *ext_cxn)
                    .await
            }
        };
        let identity = identity.inspect_err(|failure| warn!("Authentication failed: {failure:?}"))?;

        if mode == AuthMode::Register {
            let profile = CreateUser {
                name: form.name.clone(),
                email: form.email.clone(),
                gender: form.gender.clone(),
                institution: form.institution.clone(),
            };
            u_writer
                .create_user(&identity.user_id, &profile, &mut *ext_cxn)
                .await
                .context("storing the profile of a new registration")?;
            info!("Registered user {}", identity.user_id);
        }

        Ok(sessions.open(&identity.user_id))
    }

    fn sign_out(&self, token: &str, sessions: &SessionRegistry) -> Route {
        if sessions.close(token) {
            info!("Session closed");
        }

        route_for(None)
    }
}

#[cfg(test)]
mod tests {
    use super::driving_ports::{SessionError, SessionPort};
    use super::test_util::*;
    use super::*;
    use crate::domain::test_util::Connectivity;
    use crate::domain::user::Role;
    use crate::domain::user::test_util::InMemoryUserPersistence;
    use crate::external_connections::test_util::FakeExternalConnectivity;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn sign_in_form() -> CredentialForm {
        CredentialForm {
            email: "ada@example.com".to_owned(),
            password: "abc123".to_owned(),
            ..CredentialForm::default()
        }
    }

    fn registration_form() -> CredentialForm {
        CredentialForm {
            name: "Ada".to_owned(),
            gender: "Female".to_owned(),
            institution: "Analytical U".to_owned(),
            ..sign_in_form()
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn checks_run_in_order() {
            let empty = CredentialForm::default();
            assert_that!(validate_form(AuthMode::Register, &empty))
                .is_err_containing(FormError::MissingCredentials);

            let bad_email = CredentialForm {
                email: "not-an-email".to_owned(),
                password: "abc".to_owned(),
                ..CredentialForm::default()
            };
            assert_that!(validate_form(AuthMode::Register, &bad_email))
                .is_err_containing(FormError::InvalidEmail);

            let weak = CredentialForm {
                email: "ada@example.com".to_owned(),
                password: "abc".to_owned(),
                ..CredentialForm::default()
            };
            assert_that!(validate_form(AuthMode::Register, &weak))
                .is_err_containing(FormError::WeakPassword);

            assert_that!(validate_form(AuthMode::Register, &sign_in_form()))
                .is_err_containing(FormError::MissingRegistrationFields);
        }

        #[test]
        fn sign_in_ignores_profile_fields() {
            assert_that!(validate_form(AuthMode::SignIn, &sign_in_form())).is_ok();
            assert_that!(validate_form(AuthMode::Register, &registration_form())).is_ok();
        }

        #[test]
        fn email_shape() {
            for valid in ["a.b-c_d@mail.example.org", "x@y.io", "UPPER@CASE.COM"] {
                assert!(EMAIL_SHAPE.is_match(valid), "{valid} should be accepted");
            }
            for invalid in ["a@b", "a b@c.com", "a@b.c", "a@b.abcdefg", "@b.com"] {
                assert!(!EMAIL_SHAPE.is_match(invalid), "{invalid} should be rejected");
            }
        }

        #[test]
        fn password_strength() {
            assert!(is_strong_password("abc123"));
            assert!(is_strong_password("1a2b3c4d"));
            assert!(!is_strong_password("abc12"));
            assert!(!is_strong_password("abcdefg"));
            assert!(!is_strong_password("1234567"));
            assert!(!is_strong_password("abc 123"));
            assert!(!is_strong_password("abc123!"));
        }

        #[test]
        fn messages_match_what_users_see() {
            assert_eq!(
                "Email and Password are required.",
                FormError::MissingCredentials.to_string()
            );
            assert_eq!(
                "Password must be at least 6 characters long and contain a number.",
                FormError::WeakPassword.to_string()
            );
            assert_eq!(
                "All fields are required for registration.",
                FormError::MissingRegistrationFields.to_string()
            );
        }
    }

    mod auth_failure {
        use super::*;

        #[test]
        fn user_messages_and_hints() {
            assert_eq!(
                "Account does not exist. Please register first.",
                AuthFailure::AccountNotFound.user_message()
            );
            assert_eq!(
                "Please check your network and try again",
                AuthFailure::NetworkFailure.user_message()
            );
            assert_eq!(
                "Error: TOO_MANY_ATTEMPTS",
                AuthFailure::Other("TOO_MANY_ATTEMPTS".to_owned()).user_message()
            );
            assert!(AuthFailure::InvalidCredential.shows_register_hint());
            assert!(AuthFailure::NetworkFailure.shows_register_hint());
            assert!(!AuthFailure::Other("boom".to_owned()).shows_register_hint());
        }
    }

    mod submit {
        use super::*;

        #[tokio::test]
        async fn sign_in_opens_a_session() {
            let provider = MockIdentityProvider::new_locked();
            provider
                .lock()
                .expect("mock provider mutex poisoned")
                .sign_in_result
                .set_returned_result(Ok(Identity {
                    user_id: "uid-1".to_owned(),
                }));
            let user_persist = InMemoryUserPersistence::new_locked();
            let sessions = SessionRegistry::new();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let session = SessionService {}
                .submit(
                    AuthMode::SignIn,
                    &sign_in_form(),
                    &mut ext_cxn,
                    &sessions,
                    &provider,
                    &user_persist,
                )
                .await
                .expect("sign in failed");

            assert_eq!("uid-1", session.user_id);
            assert_that!(sessions.resolve(&session.token))
                .is_some()
                .matches(|resolved| resolved.user_id == "uid-1");
            let locked_provider = provider.lock().expect("mock provider mutex poisoned");
            assert_eq!(
                &[("ada@example.com".to_owned(), "abc123".to_owned())],
                locked_provider.sign_in_result.calls()
            );
            assert!(locked_provider.register_result.calls().is_empty());
            assert!(user_persist.read().expect("rw lock poisoned").users.is_empty());
        }

        #[tokio::test]
        async fn register_stores_a_regular_user_profile() {
            let provider = MockIdentityProvider::new_locked();
            provider
                .lock()
                .expect("mock provider mutex poisoned")
                .register_result
                .set_returned_result(Ok(Identity {
                    user_id: "uid-2".to_owned(),
                }));
            let user_persist = InMemoryUserPersistence::new_locked();
            let sessions = SessionRegistry::new();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let submit_result = SessionService {}
                .submit(
                    AuthMode::Register,
                    &registration_form(),
                    &mut ext_cxn,
                    &sessions,
                    &provider,
                    &user_persist,
                )
                .await;
            assert_that!(submit_result).is_ok();

            let locked_persist = user_persist.read().expect("rw lock poisoned");
            assert!(matches!(locked_persist.users.as_slice(), [user]
                if user.id == "uid-2"
                    && user.name == "Ada"
                    && user.email == "ada@example.com"
                    && user.institution == "Analytical U"
                    && user.role == Role::User));
        }

        #[tokio::test]
        async fn weak_password_never_reaches_the_provider() {
            let provider = MockIdentityProvider::new_locked();
            let user_persist = InMemoryUserPersistence::new_locked();
            let sessions = SessionRegistry::new();
            let mut ext_cxn = FakeExternalConnectivity::new();
            let form = CredentialForm {
                password: "abc".to_owned(),
                ..registration_form()
            };

            let submit_result = SessionService {}
                .submit(
                    AuthMode::Register,
                    &form,
                    &mut ext_cxn,
                    &sessions,
                    &provider,
                    &user_persist,
                )
                .await;

            let Err(SessionError::Invalid(form_err)) = submit_result else {
                panic!("Expected a validation error, got {submit_result:#?}");
            };
            assert_eq!(FormError::WeakPassword, form_err);
            let locked_provider = provider.lock().expect("mock provider mutex poisoned");
            assert!(locked_provider.register_result.calls().is_empty());
            assert!(locked_provider.sign_in_result.calls().is_empty());
            assert!(user_persist.read().expect("rw lock poisoned").users.is_empty());
        }

        #[tokio::test]
        async fn auth_failures_are_reported_without_a_session() {
            let provider = MockIdentityProvider::new_locked();
            provider
                .lock()
                .expect("mock provider mutex poisoned")
                .sign_in_result
                .set_returned_result(Err(AuthFailure::AccountNotFound));
            let user_persist = InMemoryUserPersistence::new_locked();
            let sessions = SessionRegistry::new();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let submit_result = SessionService {}
                .submit(
                    AuthMode::SignIn,
                    &sign_in_form(),
                    &mut ext_cxn,
                    &sessions,
                    &provider,
                    &user_persist,
                )
                .await;
            assert!(matches!(
                submit_result,
                Err(SessionError::AuthFailed(AuthFailure::AccountNotFound))
            ));
            assert_eq!(
                1,
                provider
                    .lock()
                    .expect("mock provider mutex poisoned")
                    .sign_in_result
                    .calls()
                    .len()
            );
        }

        #[tokio::test]
        async fn profile_store_failure_after_registration_is_a_port_error() {
            let provider = MockIdentityProvider::new_locked();
            provider
                .lock()
                .expect("mock provider mutex poisoned")
                .register_result
                .set_returned_result(Ok(Identity {
                    user_id: "uid-3".to_owned(),
                }));
            let mut raw_persist = InMemoryUserPersistence::new();
            raw_persist.connectivity = Connectivity::Disconnected;
            let user_persist = RwLock::new(raw_persist);
            let sessions = SessionRegistry::new();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let submit_result = SessionService {}
                .submit(
                    AuthMode::Register,
                    &registration_form(),
                    &mut ext_cxn,
                    &sessions,
                    &provider,
                    &user_persist,
                )
                .await;
            assert!(matches!(submit_result, Err(SessionError::PortError(_))));
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn routes_follow_authentication_state() {
            let sessions = SessionRegistry::new();
            let session = sessions.open("uid-1");

            assert_eq!(Route::Dashboard, route_for(Some(&session)));
            assert_eq!("/dashboard", route_for(Some(&session)).path());
            assert_eq!(Route::Entry, route_for(None));
            assert_eq!("/", route_for(None).path());
        }

        #[tokio::test]
        async fn sign_out_signals_and_forgets_the_session() {
            let sessions = SessionRegistry::new();
            let session = sessions.open("uid-1");
            let ended = tokio::spawn(session_ended(session.end_signal()));

            let route = SessionService {}.sign_out(&session.token, &sessions);

            assert_eq!(Route::Entry, route);
            assert!(sessions.resolve(&session.token).is_none());
            ended.await.expect("session end task panicked");
            assert!(!sessions.close(&session.token));
        }

        #[tokio::test(start_paused = true)]
        async fn idle_sessions_expire_and_end_their_feeds() {
            let sessions = SessionRegistry::with_idle_timeout(Duration::from_secs(60));
            let session = sessions.open("uid-1");
            let ended = tokio::spawn(session_ended(session.end_signal()));

            tokio::time::advance(Duration::from_secs(45)).await;
            assert!(sessions.resolve(&session.token).is_some());
            tokio::time::advance(Duration::from_secs(45)).await;
            assert!(sessions.resolve(&session.token).is_some());

            tokio::time::advance(Duration::from_secs(61)).await;
            assert!(sessions.resolve(&session.token).is_none());
            ended.await.expect("session end task panicked");
            assert_eq!(0, sessions.open_count());
        }

        #[tokio::test(start_paused = true)]
        async fn opening_a_session_sweeps_idle_ones() {
            let sessions = SessionRegistry::with_idle_timeout(Duration::from_secs(60));
            let abandoned = sessions.open("uid-1");

            tokio::time::advance(Duration::from_secs(61)).await;
            let fresh = sessions.open("uid-2");

            assert_eq!(1, sessions.open_count());
            assert!(*abandoned.end_signal().borrow());
            assert!(sessions.resolve(&fresh.token).is_some());
        }

        #[test]
        fn tokens_are_unique() {
            let sessions = SessionRegistry::new();
            let first = sessions.open("uid-1");
            let second = sessions.open("uid-1");

            assert_ne!(first.token, second.token);
        }
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use crate::domain::test_util::FakeImplementation;

    pub struct MockIdentityProvider {
        pub sign_in_result: FakeImplementation<(String, String), Result<Identity, AuthFailure>>,
        pub register_result: FakeImplementation<(String, String), Result<Identity, AuthFailure>>,
    }

    impl MockIdentityProvider {
        pub fn new() -> MockIdentityProvider {
            MockIdentityProvider {
                sign_in_result: FakeImplementation::new(),
                register_result: FakeImplementation::new(),
            }
        }

        pub fn new_locked() -> Mutex<MockIdentityProvider> {
            Mutex::new(Self::new())
        }
    }

    impl driven_ports::IdentityProvider for Mutex<MockIdentityProvider> {
        async fn sign_in(
            &self,
            email: &str,
            password: &str,
            _: &mut impl ExternalConnectivity,
        ) -> Result<Identity, AuthFailure> {
            let mut locked_self = self.lock().expect("mock provider mutex poisoned");
            locked_self
                .sign_in_result
                .save_arguments((email.to_owned(), password.to_owned()));

            locked_self.sign_in_result.return_value_result()
        }

        async fn register(
            &self,
            email: &str,
            password: &str,
            _: &mut impl ExternalConnectivity,
        ) -> Result<Identity, AuthFailure> {
            let mut locked_self = self.lock().expect("mock provider mutex poisoned");
            locked_self
                .register_result
                .save_arguments((email.to_owned(), password.to_owned()));

            locked_self.register_result.return_value_result()
        }
    }
}
