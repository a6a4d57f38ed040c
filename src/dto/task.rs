use crate::domain;
use crate::domain::task_feed::{FeedSnapshot, TaskView};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// DTO for creating a new task via the API
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTask {
    #[validate(length(min = 1))]
    #[schema(example = "Essay draft")]
    pub title: String,
    #[validate(length(min = 1))]
    #[schema(example = "Two pages on the French revolution")]
    pub description: String,
    #[schema(example = "2024-03-10")]
    pub deadline: NaiveDate,
}

impl From<NewTask> for domain::todo::NewTask {
    fn from(value: NewTask) -> Self {
        domain::todo::NewTask {
            title: value.title,
            description: value.description,
            deadline: value.deadline,
        }
    }
}

/// DTO for updating a task's content via the API
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateTask {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub deadline: NaiveDate,
}

impl From<UpdateTask> for domain::todo::UpdateTask {
    fn from(value: UpdateTask) -> Self {
        domain::todo::UpdateTask {
            title: value.title,
            description: value.description,
            deadline: value.deadline,
        }
    }
}

/// DTO for marking a task done or not done
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct SetCompleted {
    pub completed: bool,
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Overdue,
    Incomplete,
}

impl From<domain::todo::TaskStatus> for TaskStatus {
    fn from(value: domain::todo::TaskStatus) -> Self {
        match value {
            domain::todo::TaskStatus::Completed => Self::Completed,
            domain::todo::TaskStatus::Overdue => Self::Overdue,
            domain::todo::TaskStatus::Incomplete => Self::Incomplete,
        }
    }
}

/// DTO for a returned task on the API, with properties derived for the current day
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TaskResponse {
    #[schema(example = "3f2c8a0e-4f4b-4d47-9d0e-2d3c8a7b1c11")]
    pub id: String,
    #[schema(example = "Essay draft")]
    pub title: String,
    #[schema(example = "Two pages on the French revolution")]
    pub description: String,
    #[schema(example = "2024-03-10")]
    pub deadline: NaiveDate,
    pub completed: bool,
    pub status: TaskStatus,
    pub due_today: bool,
}

impl From<TaskView> for TaskResponse {
    fn from(value: TaskView) -> Self {
        TaskResponse {
            id: value.task.id,
            title: value.task.title,
            description: value.task.description,
            deadline: value.task.deadline,
            completed: value.task.completed,
            status: value.status.into(),
            due_today: value.due_today,
        }
    }
}

impl TaskResponse {
    pub fn on_day(task: domain::todo::TrackedTask, today: NaiveDate) -> TaskResponse {
        TaskView {
            status: task.status(today),
            due_today: task.is_due_today(today),
            task,
        }
        .into()
    }
}

/// DTO for a newly created task
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct InsertedTask {
    #[schema(example = "3f2c8a0e-4f4b-4d47-9d0e-2d3c8a7b1c11")]
    pub id: String,
}

/// Optional case-insensitive title prefix filter
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct TaskSearch {
    pub search: Option<String>,
}

/// Payload of every `snapshot` event on the live task feed
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TaskFeedSnapshot {
    pub tasks: Vec<TaskResponse>,
    pub notifications_requested: usize,
}

impl From<FeedSnapshot> for TaskFeedSnapshot {
    fn from(value: FeedSnapshot) -> Self {
        TaskFeedSnapshot {
            tasks: value.tasks.into_iter().map(TaskResponse::from).collect(),
            notifications_requested: value.notifications_requested,
        }
    }
}
