use crate::domain;
use crate::domain::todo::{NewTask, TaskSnapshots, TrackedTask, UpdateTask};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error, anyhow, bail};
use chrono::NaiveDate;
use futures::{StreamExt, stream};
use sqlx::postgres::PgListener;
use sqlx::{PgExecutor, query, query_as};
use tracing::{debug, warn};

/// Channel the task table's trigger notifies with the owner of every changed task
const TASK_CHANGES_CHANNEL: &str = "task_changes";
const TASK_COLUMNS: &str = "t.id, t.owner_id, t.title, t.description, t.deadline, t.completed";

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    owner_id: String,
    title: String,
    description: String,
    deadline: NaiveDate,
    completed: bool,
}

impl From<TaskRow> for TrackedTask {
    fn from(value: TaskRow) -> Self {
        TrackedTask {
            id: value.id,
            owner_user_id: value.owner_id,
            title: value.title,
            description: value.description,
            deadline: value.deadline,
            completed: value.completed,
        }
    }
}

async fn owned_tasks<'e>(
    user_id: &str,
    executor: impl PgExecutor<'e>,
) -> Result<Vec<TrackedTask>, Error> {
    let tasks = query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM task t WHERE t.owner_id = $1 ORDER BY t.created_at, t.id"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
    .context("trying to fetch tasks for a user")?
    .into_iter()
    .map(TrackedTask::from)
    .collect();

    Ok(tasks)
}

pub struct DbTaskReader {}

impl domain::todo::driven_ports::TaskReader for DbTaskReader {
    async fn tasks_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<TrackedTask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        owned_tasks(user_id, cxn.borrow_connection()).await
    }

    async fn user_task_by_id(
        &self,
        user_id: &str,
        task_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<TrackedTask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let task = query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM task t WHERE t.owner_id = $1 AND t.id = $2"
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to fetch a task by ID")?
        .map(TrackedTask::from);

        Ok(task)
    }

    async fn all_tasks(
        &self,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<TrackedTask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let tasks = query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM task t ORDER BY t.created_at, t.id"
        ))
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to fetch every task")?
        .into_iter()
        .map(TrackedTask::from)
        .collect();

        Ok(tasks)
    }
}

pub struct DbTaskWriter {}

impl domain::todo::driven_ports::TaskWriter for DbTaskWriter {
    async fn create_task_for_user(
        &self,
        user_id: &str,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<String, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let new_id = query_as::<_, super::NewId>(
            "INSERT INTO task(owner_id, title, description, deadline) VALUES ($1, $2, $3, $4) RETURNING task.id",
        )
        .bind(user_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(new_task.deadline)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to insert a new task into the database")?;

        Ok(new_id.id)
    }

    async fn delete_task(
        &self,
        task_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let deleted = query("DELETE FROM task WHERE id = $1")
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a task from the database")?;
        if deleted.rows_affected() == 0 {
            bail!("task {task_id} was already gone");
        }

        Ok(())
    }

    async fn update_task(
        &self,
        task_id: &str,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("UPDATE task SET title = $1, description = $2, deadline = $3 WHERE id = $4")
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.deadline)
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to update a task in the database")?;

        Ok(())
    }

    async fn set_completed(
        &self,
        task_id: &str,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("UPDATE task SET completed = $1 WHERE id = $2")
            .bind(completed)
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to change a task's completion")?;

        Ok(())
    }
}

/// Live query over a user's tasks built on LISTEN/NOTIFY. The listener's dedicated
/// connection is also used to re-query, so one feed holds exactly one connection.
pub struct DbTaskWatcher {}

impl domain::todo::driven_ports::TaskWatcher for DbTaskWatcher {
    async fn watch_tasks_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<TaskSnapshots, Error> {
        let mut listener = ext_cxn.database_listener().await?;
        // Listen before the first read so no write between the two is missed
        listener
            .listen(TASK_CHANGES_CHANNEL)
            .await
            .context("subscribing to task changes")?;
        let initial = owned_tasks(user_id, &mut listener).await?;
        let owner = user_id.to_owned();

        // The listener is dropped after the first error, which ends the stream
        let updates = stream::unfold(Some(listener), move |listener| {
            next_snapshot(owner.clone(), listener)
        });

        Ok(stream::once(async move { Ok::<_, Error>(initial) })
            .chain(updates)
            .boxed())
    }
}

async fn next_snapshot(
    owner: String,
    listener: Option<PgListener>,
) -> Option<(Result<Vec<TrackedTask>, Error>, Option<PgListener>)> {
    let mut listener = listener?;
    loop {
        // Ok(None) is a dropped connection. Changes made while it was down are lost for good.
        let notification = match listener.try_recv().await {
            Ok(Some(notification)) => notification,
            Ok(None) => {
                warn!("Lost the task change subscription for user {owner}");
                return Some((Err(anyhow!("lost the task change subscription")), None));
            }
            Err(listen_err) => {
                let err = Error::new(listen_err).context("waiting for task changes");
                return Some((Err(err), None));
            }
        };

        if notification.payload() != owner {
            continue;
        }

        debug!("Tasks for user {owner} changed, re-reading them");
        let snapshot = owned_tasks(&owner, &mut listener).await;
        let listener = snapshot.is_ok().then_some(listener);
        return Some((snapshot, listener));
    }
}
