use crate::domain::todo::driven_ports::{TaskReader, TaskWriter};
use crate::domain::todo::driving_ports::TaskError;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use tracing::info;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TrackedTask {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub completed: bool,
}

/// How a task should be presented, derived from its completion flag and deadline
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TaskStatus {
    Completed,
    Overdue,
    Incomplete,
}

impl TrackedTask {
    /// Incomplete and the deadline is a calendar day before today
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.deadline < today
    }

    /// Incomplete and the deadline falls on today's calendar day
    pub fn is_due_today(&self, today: NaiveDate) -> bool {
        !self.completed && self.deadline == today
    }

    pub fn status(&self, today: NaiveDate) -> TaskStatus {
        if self.completed {
            TaskStatus::Completed
        } else if self.is_overdue(today) {
            TaskStatus::Overdue
        } else {
            TaskStatus::Incomplete
        }
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(Clone))]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub deadline: NaiveDate,
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct UpdateTask {
    pub title: String,
    pub description: String,
    pub deadline: NaiveDate,
}

/// A live query over one user's tasks. Every item is the complete list of that user's
/// tasks at the moment of a write; the first item is the state at subscription time.
/// Dropping the stream ends the subscription.
pub type TaskSnapshots = BoxStream<'static, Result<Vec<TrackedTask>, anyhow::Error>>;

pub mod driven_ports {
    use super::*;

    pub trait TaskReader {
        async fn tasks_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TrackedTask>, anyhow::Error>;
        async fn user_task_by_id(
            &self,
            user_id: &str,
            task_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<TrackedTask>, anyhow::Error>;
        async fn all_tasks(
            &self,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TrackedTask>, anyhow::Error>;
    }

    pub trait TaskWriter {
        /// Creates an incomplete task and returns its generated ID
        async fn create_task_for_user(
            &self,
            user_id: &str,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<String, anyhow::Error>;

        async fn delete_task(
            &self,
            task_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn update_task(
            &self,
            task_id: &str,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn set_completed(
            &self,
            task_id: &str,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }

    pub trait TaskWatcher {
        async fn watch_tasks_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<TaskSnapshots, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum TaskError {
        #[error("The specified task does not exist.")]
        TaskDoesNotExist,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    /// Task operations on behalf of the task's owner. Tasks owned by someone else are
    /// reported as [TaskError::TaskDoesNotExist].
    pub trait TaskPort {
        async fn tasks_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
        ) -> Result<Vec<TrackedTask>, TaskError>;
        async fn create_task_for_user(
            &self,
            user_id: &str,
            task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<String, TaskError>;
        async fn update_task(
            &self,
            user_id: &str,
            task_id: &str,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<(), TaskError>;
        async fn set_completed(
            &self,
            user_id: &str,
            task_id: &str,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<(), TaskError>;
        async fn delete_task(
            &self,
            user_id: &str,
            task_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<(), TaskError>;
    }
}

pub struct TaskService {}

impl TaskService {
    async fn verify_owned_by(
        &self,
        user_id: &str,
        task_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<(), TaskError> {
        task_read
            .user_task_by_id(user_id, task_id, &mut *ext_cxn)
            .await
            .context("looking up a task before changing it")?
            .map(|_| ())
            .ok_or(TaskError::TaskDoesNotExist)
    }
}

impl driving_ports::TaskPort for TaskService {
    async fn tasks_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Vec<TrackedTask>, TaskError> {
        let tasks = task_read
            .tasks_for_user(user_id, &mut *ext_cxn)
            .await
            .context("fetching a user's tasks")?;

        Ok(tasks)
    }

    async fn create_task_for_user(
        &self,
        user_id: &str,
        task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<String, TaskError> {
        let created_task_id = task_write
            .create_task_for_user(user_id, task, &mut *ext_cxn)
            .await
            .context("creating a task")?;

        info!("Created task {created_task_id} for user {user_id}");
        Ok(created_task_id)
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        self.verify_owned_by(user_id, task_id, &mut *ext_cxn, task_read)
            .await?;
        task_write
            .update_task(task_id, update, &mut *ext_cxn)
            .await
            .context("updating a task")?;
        Ok(())
    }

    async fn set_completed(
        &self,
        user_id: &str,
        task_id: &str,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        self.verify_owned_by(user_id, task_id, &mut *ext_cxn, task_read)
            .await?;
        task_write
            .set_completed(task_id, completed, &mut *ext_cxn)
            .await
            .context("changing a task's completion")?;
        Ok(())
    }

    async fn delete_task(
        &self,
        user_id: &str,
        task_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        self.verify_owned_by(user_id, task_id, &mut *ext_cxn, task_read)
            .await?;
        task_write
            .delete_task(task_id, &mut *ext_cxn)
            .await
            .context("deleting a task")?;
        Ok(())
    }
}
