use crate::api::auth::AuthenticatedUser;
use crate::domain::notification::driven_ports::Notifier;
use crate::domain::session::{Session, session_ended};
use crate::domain::task_feed::{FeedSnapshot, NotificationPolicy, TaskFeed, TaskFeedError};
use crate::domain::todo::driven_ports::{TaskReader, TaskWatcher, TaskWriter};
use crate::domain::todo::driving_ports::{TaskError, TaskPort};
use crate::domain::{Clock, SystemClock, matches_search_prefix};
use crate::external_connections::ExternalConnectivity;
use crate::remote::push_gateway::PushGatewayNotifier;
use crate::routing_utils::{BasicErrorResponse, Json, ValidationErrorResponse};
use crate::{AppState, SharedData, domain, dto, persistence};
use anyhow::Context;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, patch, put};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, create_task, update_task, set_completed, delete_task, task_feed),
    components(schemas(
        dto::NewTask,
        dto::UpdateTask,
        dto::SetCompleted,
        dto::InsertedTask,
        dto::TaskFeedSnapshot
    ))
)]
/// Defines the OpenAPI documentation for the signed-in user's tasks
pub struct TaskApi;
/// Constant used to group task endpoints in OpenAPI documentation
pub const TASK_API_GROUP: &str = "Tasks";

/// Adds routes under "/tasks" to the application router. Every route acts on the caller's own tasks.
pub fn task_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/tasks",
            get(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Query(search): Query<dto::TaskSearch>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::todo::TaskService {};
                    let task_reader = persistence::db_todo_driven_ports::DbTaskReader {};

                    list_tasks(
                        &session.user_id,
                        search.search,
                        &mut ext_cxn,
                        &task_service,
                        &task_reader,
                        &SystemClock,
                    )
                    .await
                },
            )
            .post(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Json(new_task): Json<dto::NewTask>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::todo::TaskService {};
                    let task_writer = persistence::db_todo_driven_ports::DbTaskWriter {};

                    create_task(
                        &session.user_id,
                        new_task,
                        &mut ext_cxn,
                        &task_service,
                        &task_writer,
                    )
                    .await
                },
            ),
        )
        .route(
            "/tasks/feed",
            get(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Query(search): Query<dto::TaskSearch>| {
                    let notifier = PushGatewayNotifier::new(
                        app_state.push_gateway_url.clone(),
                        persistence::db_push_token_driven_ports::DbPushTokens {},
                    );

                    task_feed(
                        session,
                        search.search,
                        app_state.notification_policy,
                        app_state.ext_cxn.clone(),
                        &persistence::db_todo_driven_ports::DbTaskWatcher {},
                        notifier,
                        SystemClock,
                    )
                    .await
                    .map(feed_events)
                },
            ),
        )
        .route(
            "/tasks/:task_id",
            patch(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(task_id): Path<String>,
                       Json(update): Json<dto::UpdateTask>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::todo::TaskService {};

                    update_task(
                        &session.user_id,
                        &task_id,
                        update,
                        &mut ext_cxn,
                        &task_service,
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &persistence::db_todo_driven_ports::DbTaskWriter {},
                    )
                    .await
                },
            )
            .delete(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(task_id): Path<String>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::todo::TaskService {};

                    delete_task(
                        &session.user_id,
                        &task_id,
                        &mut ext_cxn,
                        &task_service,
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &persistence::db_todo_driven_ports::DbTaskWriter {},
                    )
                    .await
                },
            ),
        )
        .route(
            "/tasks/:task_id/completed",
            put(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(task_id): Path<String>,
                       Json(completion): Json<dto::SetCompleted>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::todo::TaskService {};

                    set_completed(
                        &session.user_id,
                        &task_id,
                        completion.completed,
                        &mut ext_cxn,
                        &task_service,
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &persistence::db_todo_driven_ports::DbTaskWriter {},
                    )
                    .await
                },
            ),
        )
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = TASK_API_GROUP,
    params(dto::TaskSearch),
    responses(
        (status = 200, description = "The caller's tasks", body = Vec<dto::TaskResponse>),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Lists the caller's tasks, optionally only those whose title starts with the search text
async fn list_tasks(
    user_id: &str,
    search: Option<String>,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_reader: &impl TaskReader,
    clock: &impl Clock,
) -> Result<Json<Vec<dto::TaskResponse>>, TaskError> {
    let tasks = task_service
        .tasks_for_user(user_id, &mut *ext_cxn, task_reader)
        .await?;
    let today = clock.today();

    let responses = tasks
        .into_iter()
        .filter(|task| match search {
            Some(ref query) => matches_search_prefix(&task.title, query),
            None => true,
        })
        .map(|task| dto::TaskResponse::on_day(task, today))
        .collect();

    Ok(Json(responses))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = TASK_API_GROUP,
    request_body = dto::NewTask,
    responses(
        (status = 201, description = "Task created", body = dto::InsertedTask),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Creates an incomplete task owned by the caller
async fn create_task(
    user_id: &str,
    new_task: dto::NewTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_writer: &impl TaskWriter,
) -> Result<(StatusCode, Json<dto::InsertedTask>), ErrorResponse> {
    info!("Adding task for user {user_id}");
    new_task.validate().map_err(ValidationErrorResponse::from)?;

    let domain_task = domain::todo::NewTask::from(new_task);
    let id = task_service
        .create_task_for_user(user_id, &domain_task, &mut *ext_cxn, task_writer)
        .await?;

    Ok((StatusCode::CREATED, Json(dto::InsertedTask { id })))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task to change")),
    request_body = dto::UpdateTask,
    responses(
        (status = 200, description = "Task updated"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Updates the content of a task
async fn update_task(
    user_id: &str,
    task_id: &str,
    task_data: dto::UpdateTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_reader: &impl TaskReader,
    task_writer: &impl TaskWriter,
) -> Result<StatusCode, ErrorResponse> {
    info!("Updating task {task_id}");
    task_data
        .validate()
        .map_err(ValidationErrorResponse::from)?;

    let domain_update = domain::todo::UpdateTask::from(task_data);
    task_service
        .update_task(
            user_id,
            task_id,
            &domain_update,
            &mut *ext_cxn,
            task_reader,
            task_writer,
        )
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    put,
    path = "/tasks/{task_id}/completed",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task to mark")),
    request_body = dto::SetCompleted,
    responses(
        (status = 200, description = "Completion recorded"),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Marks a task done or not done
async fn set_completed(
    user_id: &str,
    task_id: &str,
    completed: bool,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_reader: &impl TaskReader,
    task_writer: &impl TaskWriter,
) -> Result<StatusCode, TaskError> {
    info!("Setting completion of task {task_id} to {completed}");
    task_service
        .set_completed(
            user_id,
            task_id,
            completed,
            &mut *ext_cxn,
            task_reader,
            task_writer,
        )
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task to delete")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Deletes a task
async fn delete_task(
    user_id: &str,
    task_id: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_reader: &impl TaskReader,
    task_writer: &impl TaskWriter,
) -> Result<StatusCode, TaskError> {
    info!("Deleting task {task_id}");
    task_service
        .delete_task(user_id, task_id, &mut *ext_cxn, task_reader, task_writer)
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/tasks/feed",
    tag = TASK_API_GROUP,
    params(dto::TaskSearch),
    responses(
        (status = 200, description = "Server-sent events. Each `snapshot` event carries every task the \
            caller owns at that moment. A single `error` event is sent if the live query fails, then the \
            stream ends. The stream also ends when the session is closed.",
            content_type = "text/event-stream", body = dto::TaskFeedSnapshot),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Opens the live view of the caller's tasks, which also requests deadline notifications
/// for tasks due today. The feed is bound to the session and stops when it closes.
async fn task_feed<W, Cxn, N, K>(
    session: Session,
    search: Option<String>,
    policy: NotificationPolicy,
    mut ext_cxn: Cxn,
    task_watcher: &W,
    notifier: N,
    clock: K,
) -> Result<impl Stream<Item = Result<FeedSnapshot, TaskFeedError>> + use<W, Cxn, N, K>, TaskError>
where
    W: TaskWatcher,
    Cxn: ExternalConnectivity,
    N: Notifier,
    K: Clock,
{
    let snapshots = task_watcher
        .watch_tasks_for_user(&session.user_id, &mut ext_cxn)
        .await
        .context("subscribing to a user's tasks")?;

    let feed = TaskFeed::new(&session.user_id, policy)
        .with_search(search)
        .run(snapshots, ext_cxn, notifier, clock)
        .take_until(session_ended(session.end_signal()));

    Ok(feed)
}

/// Turns feed items into server-sent events
fn feed_events(
    feed: impl Stream<Item = Result<FeedSnapshot, TaskFeedError>> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let events = feed.map(|item| {
        let event = match item {
            Ok(snapshot) => Event::default()
                .event("snapshot")
                .json_data(dto::TaskFeedSnapshot::from(snapshot))
                .unwrap_or_else(|err| {
                    warn!("Could not serialize a task snapshot: {err}");
                    Event::default().event("error").data("snapshot unavailable")
                }),
            Err(feed_err) => Event::default().event("error").data(feed_err.to_string()),
        };

        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
