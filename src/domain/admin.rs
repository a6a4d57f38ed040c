use crate::domain::matches_search_prefix;
use crate::domain::todo::TrackedTask;
use crate::domain::todo::driven_ports::{TaskReader, TaskWriter};
use crate::domain::user::driven_ports::{UserReader, UserWriter};
use crate::domain::user::{TrackerUser, UpdateProfile};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

/// Everything an admin sees, fetched in bulk when the panel is entered. Later operations
/// work from this snapshot rather than querying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPanel {
    pub users: Vec<TrackerUser>,
    pub tasks: Vec<TrackedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWithTasks {
    pub user: TrackerUser,
    pub tasks: Vec<TrackedTask>,
}

impl AdminPanel {
    /// Users whose name starts with the query, ignoring case. An empty query matches everyone,
    /// but users without a name never match a non-empty query.
    pub fn search(&self, query: &str) -> Vec<&TrackerUser> {
        self.users
            .iter()
            .filter(|user| {
                query.is_empty() || (!user.name.is_empty() && matches_search_prefix(&user.name, query))
            })
            .collect()
    }

    pub fn tasks_of(&self, user_id: &str) -> Vec<&TrackedTask> {
        self.tasks
            .iter()
            .filter(|task| task.owner_user_id == user_id)
            .collect()
    }

    pub fn roster(&self, query: &str) -> Vec<UserWithTasks> {
        self.search(query)
            .into_iter()
            .map(|user| UserWithTasks {
                user: user.clone(),
                tasks: self.tasks_of(&user.id).into_iter().cloned().collect(),
            })
            .collect()
    }

    fn find_user(&self, user_id: &str) -> Option<&TrackerUser> {
        self.users.iter().find(|user| user.id == user_id)
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum AdminError {
        #[error("only admins may use the admin panel")]
        AccessDenied,
        #[error("user {0} does not exist")]
        UserDoesNotExist(String),
        #[error("task {0} does not exist")]
        TaskDoesNotExist(String),
        /// A cascade delete stopped partway. Nothing already deleted is restored.
        #[error("cascade delete stopped after deleting {} task(s): {cause:#}", .deleted_tasks.len())]
        CascadeInterrupted {
            deleted_tasks: Vec<String>,
            cause: anyhow::Error,
        },
        /// A cascade delete ran inside a transaction that was rolled back, so nothing was deleted
        #[error("cascade delete was rolled back: {0:#}")]
        CascadeRolledBack(anyhow::Error),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    pub trait AdminPort {
        /// Verifies the caller is an admin and loads every user and task. The role is only
        /// checked here, so holding an [AdminPanel] is what grants access to the other operations.
        async fn enter(
            &self,
            caller_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl UserReader,
            t_reader: &impl TaskReader,
        ) -> Result<AdminPanel, AdminError>;

        /// Deletes each of the user's tasks one at a time, then the user. Returns the deleted task IDs.
        async fn cascade_delete_user(
            &self,
            panel: &AdminPanel,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_writer: &impl UserWriter,
            t_writer: &impl TaskWriter,
        ) -> Result<Vec<String>, AdminError>;

        async fn delete_task(
            &self,
            panel: &AdminPanel,
            task_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            t_writer: &impl TaskWriter,
        ) -> Result<(), AdminError>;

        async fn edit_user(
            &self,
            panel: &AdminPanel,
            user_id: &str,
            update: &UpdateProfile,
            ext_cxn: &mut impl ExternalConnectivity,
            u_writer: &impl UserWriter,
        ) -> Result<(), AdminError>;
    }
}

use driving_ports::AdminError;

pub struct AdminService {}

impl driving_ports::AdminPort for AdminService {
    async fn enter(
        &self,
        caller_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl UserReader,
        t_reader: &impl TaskReader,
    ) -> Result<AdminPanel, AdminError> {
        let caller = u_reader
            .get_by_id(caller_id, &mut *ext_cxn)
            .await
            .context("looking up the caller's role")?;
        if !caller.is_some_and(|caller| caller.is_admin()) {
            warn!("User {caller_id} tried to enter the admin panel");
            return Err(AdminError::AccessDenied);
        }

        let users = u_reader
            .get_all(&mut *ext_cxn)
            .await
            .context("loading users for the admin panel")?;
        let tasks = t_reader
            .all_tasks(&mut *ext_cxn)
            .await
            .context("loading tasks for the admin panel")?;

        Ok(AdminPanel { users, tasks })
    }

    async fn cascade_delete_user(
        &self,
        panel: &AdminPanel,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_writer: &impl UserWriter,
        t_writer: &impl TaskWriter,
    ) -> Result<Vec<String>, AdminError> {
        if panel.find_user(user_id).is_none() {
            return Err(AdminError::UserDoesNotExist(user_id.to_owned()));
        }

        let mut deleted_tasks = Vec::new();
        for task in panel.tasks_of(user_id) {
            if let Err(cause) = t_writer.delete_task(&task.id, &mut *ext_cxn).await {
                error!(
                    "Cascade delete of user {user_id} failed on task {} after {} deletion(s)",
                    task.id,
                    deleted_tasks.len()
                );
                return Err(AdminError::CascadeInterrupted {
                    deleted_tasks,
                    cause,
                });
            }
            deleted_tasks.push(task.id.clone());
        }

        if let Err(cause) = u_writer.delete_user(user_id, &mut *ext_cxn).await {
            error!("Deleted every task of user {user_id} but not the user");
            return Err(AdminError::CascadeInterrupted {
                deleted_tasks,
                cause,
            });
        }

        info!(
            "Deleted user {user_id} along with {} task(s)",
            deleted_tasks.len()
        );
        Ok(deleted_tasks)
    }

    async fn delete_task(
        &self,
        panel: &AdminPanel,
        task_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        t_writer: &impl TaskWriter,
    ) -> Result<(), AdminError> {
        if !panel.tasks.iter().any(|task| task.id == task_id) {
            return Err(AdminError::TaskDoesNotExist(task_id.to_owned()));
        }

        t_writer
            .delete_task(task_id, &mut *ext_cxn)
            .await
            .context("deleting a task as an admin")?;
        Ok(())
    }

    async fn edit_user(
        &self,
        panel: &AdminPanel,
        user_id: &str,
        update: &UpdateProfile,
        ext_cxn: &mut impl ExternalConnectivity,
        u_writer: &impl UserWriter,
    ) -> Result<(), AdminError> {
        if panel.find_user(user_id).is_none() {
            return Err(AdminError::UserDoesNotExist(user_id.to_owned()));
        }

        u_writer
            .update_profile(user_id, update, &mut *ext_cxn)
            .await
            .context("editing a user as an admin")?;
        Ok(())
    }
}
