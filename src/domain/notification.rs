use crate::domain::notification::driven_ports::PushTokenStore;
use crate::domain::todo::TrackedTask;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEADLINE_TITLE: &str = "Task Deadline Today!";
/// Every deadline notification disappears on its own after this long
pub const DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DeadlineNotification {
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub dismiss_after: Duration,
}

impl DeadlineNotification {
    pub fn for_task(task: &TrackedTask) -> DeadlineNotification {
        DeadlineNotification {
            task_id: task.id.clone(),
            title: DEADLINE_TITLE.to_owned(),
            body: format!("Your task \"{}\" is due today.", task.title),
            dismiss_after: DISMISS_AFTER,
        }
    }
}

/// Outcome of a notification request
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Delivery {
    Shown,
    /// The user never granted permission, so nothing was sent
    Dropped,
}

pub mod driven_ports {
    use super::*;

    pub trait Notifier {
        /// Shows a notification to the user. Implementations return [Delivery::Dropped] instead of
        /// an error when the user hasn't granted permission, and never queue or retry.
        async fn notify(
            &self,
            user_id: &str,
            notification: &DeadlineNotification,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Delivery, anyhow::Error>;
    }

    impl<N: Notifier> Notifier for Arc<N> {
        async fn notify(
            &self,
            user_id: &str,
            notification: &DeadlineNotification,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Delivery, anyhow::Error> {
            (**self).notify(user_id, notification, ext_cxn).await
        }
    }

    /// Registry of push tokens. Having a token on file is what "permission granted" means.
    pub trait PushTokenStore {
        async fn get_token(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<String>, anyhow::Error>;
        async fn save_token(
            &self,
            user_id: &str,
            token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
        async fn remove_token(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    pub trait PushTokenPort {
        async fn register(
            &self,
            user_id: &str,
            token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            token_store: &impl driven_ports::PushTokenStore,
        ) -> Result<(), anyhow::Error>;
        async fn revoke(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            token_store: &impl driven_ports::PushTokenStore,
        ) -> Result<(), anyhow::Error>;
    }
}

pub struct PushTokenService {}

impl driving_ports::PushTokenPort for PushTokenService {
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        token_store: &impl PushTokenStore,
    ) -> Result<(), anyhow::Error> {
        token_store
            .save_token(user_id, token, &mut *ext_cxn)
            .await
            .context("saving a push token")?;

        info!("Push notifications enabled for user {user_id}");
        Ok(())
    }

    async fn revoke(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        token_store: &impl PushTokenStore,
    ) -> Result<(), anyhow::Error> {
        token_store
            .remove_token(user_id, &mut *ext_cxn)
            .await
            .context("removing a push token")?;

        info!("Push notifications disabled for user {user_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::driving_ports::PushTokenPort;
    use super::test_util::*;
    use super::*;
    use crate::domain::test_util::{Connectivity, date};
    use crate::external_connections::test_util::FakeExternalConnectivity;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    #[test]
    fn deadline_notification_wording() {
        let task = TrackedTask {
            id: "task-9".to_owned(),
            owner_user_id: "alice".to_owned(),
            title: "Lab report".to_owned(),
            description: String::new(),
            deadline: date(2024, 2, 2),
            completed: false,
        };

        let notification = DeadlineNotification::for_task(&task);
        assert_eq!("task-9", notification.task_id);
        assert_eq!("Task Deadline Today!", notification.title);
        assert_eq!("Your task \"Lab report\" is due today.", notification.body);
        assert_eq!(Duration::from_millis(5000), notification.dismiss_after);
    }

    #[tokio::test]
    async fn register_then_revoke() {
        let token_store = InMemoryPushTokens::new_locked();
        let mut ext_cxn = FakeExternalConnectivity::new();
        let service = PushTokenService {};

        let register_result = service
            .register("alice", "token-abc", &mut ext_cxn, &token_store)
            .await;
        assert_that!(register_result).is_ok();
        assert_that!(token_store.get_token("alice", &mut ext_cxn).await)
            .is_ok()
            .is_equal_to(Some("token-abc".to_owned()));

        let revoke_result = service.revoke("alice", &mut ext_cxn, &token_store).await;
        assert_that!(revoke_result).is_ok();
        assert_that!(token_store.get_token("alice", &mut ext_cxn).await)
            .is_ok()
            .is_none();
    }

    #[tokio::test]
    async fn register_replaces_existing_token() {
        let token_store = InMemoryPushTokens::new_locked();
        let mut ext_cxn = FakeExternalConnectivity::new();
        let service = PushTokenService {};

        service
            .register("alice", "old", &mut ext_cxn, &token_store)
            .await
            .expect("first registration failed");
        service
            .register("alice", "new", &mut ext_cxn, &token_store)
            .await
            .expect("second registration failed");

        let locked_store = token_store.read().expect("token rw lock poisoned");
        assert_eq!(1, locked_store.tokens.len());
        assert_eq!(Some(&"new".to_owned()), locked_store.tokens.get("alice"));
    }

    #[tokio::test]
    async fn register_propagates_port_error() {
        let mut raw_store = InMemoryPushTokens::new();
        raw_store.connectivity = Connectivity::Disconnected;
        let token_store = RwLock::new(raw_store);
        let mut ext_cxn = FakeExternalConnectivity::new();

        let register_result = PushTokenService {}
            .register("alice", "token-abc", &mut ext_cxn, &token_store)
            .await;
        assert_that!(register_result).is_err();
    }
}
