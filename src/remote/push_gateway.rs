use crate::domain;
use crate::domain::notification::driven_ports::PushTokenStore;
use crate::domain::notification::{DeadlineNotification, Delivery};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use serde::Serialize;
use tracing::debug;

/// Delivers notifications through a push gateway to the device behind a user's push token.
/// Users without a token, or a deployment without a gateway, get nothing.
pub struct PushGatewayNotifier<T> {
    gateway_url: Option<String>,
    tokens: T,
}

impl<T> PushGatewayNotifier<T> {
    pub fn new(gateway_url: Option<String>, tokens: T) -> PushGatewayNotifier<T> {
        PushGatewayNotifier {
            gateway_url,
            tokens,
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct PushPayload<'a> {
    token: &'a str,
    title: &'a str,
    body: &'a str,
    dismiss_after_ms: u128,
}

impl<'a> PushPayload<'a> {
    fn new(token: &'a str, notification: &'a DeadlineNotification) -> PushPayload<'a> {
        PushPayload {
            token,
            title: &notification.title,
            body: &notification.body,
            dismiss_after_ms: notification.dismiss_after.as_millis(),
        }
    }
}

impl<T: PushTokenStore> domain::notification::driven_ports::Notifier for PushGatewayNotifier<T> {
    async fn notify(
        &self,
        user_id: &str,
        notification: &DeadlineNotification,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Delivery, anyhow::Error> {
        let Some(ref gateway_url) = self.gateway_url else {
            return Ok(Delivery::Dropped);
        };
        let Some(token) = self.tokens.get_token(user_id, &mut *ext_cxn).await? else {
            return Ok(Delivery::Dropped);
        };

        ext_cxn
            .http_client()
            .post(gateway_url)
            .json(&PushPayload::new(&token, notification))
            .send()
            .await
            .context("sending a notification to the push gateway")?
            .error_for_status()
            .context("push gateway rejected a notification")?;

        debug!("Push gateway accepted notification for task {}", notification.task_id);
        Ok(Delivery::Shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::driven_ports::Notifier;
    use crate::domain::notification::test_util::InMemoryPushTokens;
    use crate::domain::test_util::date;
    use crate::domain::todo::TrackedTask;
    use crate::external_connections::test_util::FakeExternalConnectivity;
    use speculoos::prelude::*;

    fn due_notification() -> DeadlineNotification {
        DeadlineNotification::for_task(&TrackedTask {
            id: "task-1".to_owned(),
            owner_user_id: "alice".to_owned(),
            title: "Essay".to_owned(),
            description: "Write it".to_owned(),
            deadline: date(2024, 3, 10),
            completed: false,
        })
    }

    #[test]
    fn payload_shape() {
        let notification = due_notification();
        let payload = serde_json::to_value(PushPayload::new("tok", &notification))
            .expect("payload did not serialize");

        assert_eq!(
            serde_json::json!({
                "token": "tok",
                "title": "Task Deadline Today!",
                "body": "Your task \"Essay\" is due today.",
                "dismiss_after_ms": 5000
            }),
            payload
        );
    }

    #[tokio::test]
    async fn drops_without_a_gateway() {
        let tokens = InMemoryPushTokens::new_locked();
        tokens
            .write()
            .expect("token rw lock poisoned")
            .tokens
            .insert("alice".to_owned(), "tok".to_owned());
        let notifier = PushGatewayNotifier::new(None, tokens);

        let delivery = notifier
            .notify("alice", &due_notification(), &mut FakeExternalConnectivity::new())
            .await;
        assert_that!(delivery).is_ok_containing(Delivery::Dropped);
    }

    #[tokio::test]
    async fn drops_without_permission() {
        let notifier = PushGatewayNotifier::new(
            Some("http://127.0.0.1:9/push".to_owned()),
            InMemoryPushTokens::new_locked(),
        );

        let delivery = notifier
            .notify("alice", &due_notification(), &mut FakeExternalConnectivity::new())
            .await;
        assert_that!(delivery).is_ok_containing(Delivery::Dropped);
    }
}
