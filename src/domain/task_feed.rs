use crate::domain::notification::driven_ports::Notifier;
use crate::domain::notification::{DeadlineNotification, Delivery};
use crate::domain::todo::{TaskSnapshots, TaskStatus, TrackedTask};
use crate::domain::{Clock, matches_search_prefix};
use crate::external_connections::ExternalConnectivity;
use chrono::NaiveDate;
use futures::{Stream, StreamExt, stream};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Decides how often a task that is due today produces a notification while a feed is live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPolicy {
    /// Notify for every due task on every snapshot, even if nothing about the task changed
    #[default]
    EverySnapshot,
    /// Notify for a due task at most once per calendar day for the lifetime of the feed
    OncePerTaskPerDay,
}

impl Display for NotificationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::EverySnapshot => "every_snapshot",
            Self::OncePerTaskPerDay => "once_per_task_per_day",
        })
    }
}

#[derive(Debug, Error)]
#[error("unknown notification policy \"{0}\", expected every_snapshot or once_per_task_per_day")]
pub struct UnknownPolicy(String);

impl FromStr for NotificationPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "every_snapshot" => Ok(Self::EverySnapshot),
            "once_per_task_per_day" => Ok(Self::OncePerTaskPerDay),
            other => Err(UnknownPolicy(other.to_owned())),
        }
    }
}

/// A task with the properties derived for the day the snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub task: TrackedTask,
    pub status: TaskStatus,
    pub due_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub tasks: Vec<TaskView>,
    /// Number of notification requests issued while processing this snapshot
    pub notifications_requested: usize,
}

#[derive(Debug, Error)]
pub enum TaskFeedError {
    #[error("the live task subscription failed: {0}")]
    SubscriptionFailed(#[source] anyhow::Error),
}

/// Live view of one user's tasks which requests a notification for every task due today
pub struct TaskFeed {
    user_id: String,
    policy: NotificationPolicy,
    search: Option<String>,
}

struct FeedState<Cxn, N, K> {
    snapshots: TaskSnapshots,
    ext_cxn: Cxn,
    notifier: N,
    clock: K,
    user_id: String,
    policy: NotificationPolicy,
    search: Option<String>,
    notified_on: HashMap<String, NaiveDate>,
    failed: bool,
}

impl TaskFeed {
    pub fn new(user_id: &str, policy: NotificationPolicy) -> TaskFeed {
        TaskFeed {
            user_id: user_id.to_owned(),
            policy,
            search: None,
        }
    }

    /// Only include tasks whose title starts with the query (ignoring case) in emitted views.
    /// Notifications are still evaluated over every task.
    pub fn with_search(mut self, query: Option<String>) -> TaskFeed {
        self.search = query.filter(|query| !query.is_empty());
        self
    }

    /// Processes the live query until it ends, fails, or the returned stream is dropped.
    /// Dropping the stream drops the subscription, so nothing is evaluated or notified afterward.
    /// A subscription failure is emitted once and then the feed ends without retrying.
    pub fn run<Cxn, N, K>(
        self,
        snapshots: TaskSnapshots,
        ext_cxn: Cxn,
        notifier: N,
        clock: K,
    ) -> impl Stream<Item = Result<FeedSnapshot, TaskFeedError>>
    where
        Cxn: ExternalConnectivity,
        N: Notifier,
        K: Clock,
    {
        info!("Starting task feed for user {}", self.user_id);
        let state = FeedState {
            snapshots,
            ext_cxn,
            notifier,
            clock,
            user_id: self.user_id,
            policy: self.policy,
            search: self.search,
            notified_on: HashMap::new(),
            failed: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.failed {
                return None;
            }

            match state.snapshots.next().await? {
                Ok(tasks) => {
                    let snapshot = state.process(tasks).await;
                    Some((Ok(snapshot), state))
                }
                Err(err) => {
                    warn!("Task feed for user {} lost its subscription: {err:#}", state.user_id);
                    state.failed = true;
                    Some((Err(TaskFeedError::SubscriptionFailed(err)), state))
                }
            }
        })
    }
}

impl<Cxn, N, K> FeedState<Cxn, N, K>
where
    Cxn: ExternalConnectivity,
    N: Notifier,
    K: Clock,
{
    async fn process(&mut self, tasks: Vec<TrackedTask>) -> FeedSnapshot {
        let today = self.clock.today();
        let mut notifications_requested = 0;

        for task in tasks.iter().filter(|task| task.is_due_today(today)) {
            if !self.should_notify(task, today) {
                continue;
            }

            notifications_requested += 1;
            self.request_notification(task).await;
        }

        let views = tasks
            .into_iter()
            .filter(|task| match self.search {
                Some(ref query) => matches_search_prefix(&task.title, query),
                None => true,
            })
            .map(|task| TaskView {
                status: task.status(today),
                due_today: task.is_due_today(today),
                task,
            })
            .collect();

        FeedSnapshot {
            tasks: views,
            notifications_requested,
        }
    }

    fn should_notify(&mut self, task: &TrackedTask, today: NaiveDate) -> bool {
        match self.policy {
            NotificationPolicy::EverySnapshot => true,
            NotificationPolicy::OncePerTaskPerDay => {
                self.notified_on.insert(task.id.clone(), today) != Some(today)
            }
        }
    }

    async fn request_notification(&mut self, task: &TrackedTask) {
        let notification = DeadlineNotification::for_task(task);
        let delivery = self
            .notifier
            .notify(&self.user_id, &notification, &mut self.ext_cxn)
            .await;

        match delivery {
            Ok(Delivery::Shown) => {
                debug!("Deadline notification for task {} shown", task.id)
            }
            Ok(Delivery::Dropped) => debug!(
                "User {} has not allowed notifications, dropped notification for task {}",
                self.user_id, task.id
            ),
            Err(err) => warn!(
                "Failed to deliver deadline notification for task {}: {err:#}",
                task.id
            ),
        }
    }
}
