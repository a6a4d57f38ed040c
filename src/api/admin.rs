use crate::api::auth::AuthenticatedUser;
use crate::domain::admin::driving_ports::{AdminError, AdminPort};
use crate::domain::todo::driven_ports::{TaskReader, TaskWriter};
use crate::domain::user::driven_ports::{UserReader, UserWriter};
use crate::domain::{Clock, SystemClock};
use crate::external_connections::{ExternalConnectivity, Transactable, TransactionHandle};
use crate::routing_utils::{BasicErrorResponse, Json, ValidationErrorResponse};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{delete, get, patch};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(
    paths(list_users, edit_user, delete_user, delete_task),
    components(schemas(dto::AdminUserEntry, dto::CascadeDeleted))
)]
/// Defines the OpenAPI documentation for the admin panel
pub struct AdminApi;
/// Constant used to group admin endpoints in OpenAPI documentation
pub const ADMIN_API_GROUP: &str = "Admin";

/// Builds a router for the "/admin" routes. Every request re-checks the caller's role.
pub fn admin_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/admin/users",
            get(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Query(search): Query<dto::UserSearch>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let admin_service = domain::admin::AdminService {};

                    list_users(
                        &session.user_id,
                        search.search.unwrap_or_default(),
                        &mut ext_cxn,
                        &admin_service,
                        &persistence::db_user_driven_ports::DbReadUsers {},
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &SystemClock,
                    )
                    .await
                },
            ),
        )
        .route(
            "/admin/users/:user_id",
            patch(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(user_id): Path<String>,
                       Json(update): Json<dto::UpdateProfile>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let admin_service = domain::admin::AdminService {};

                    edit_user(
                        &session.user_id,
                        &user_id,
                        update,
                        &mut ext_cxn,
                        &admin_service,
                        &persistence::db_user_driven_ports::DbReadUsers {},
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &persistence::db_user_driven_ports::DbWriteUsers {},
                    )
                    .await
                },
            )
            .delete(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(user_id): Path<String>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let admin_service = domain::admin::AdminService {};

                    delete_user(
                        &session.user_id,
                        &user_id,
                        &mut ext_cxn,
                        &admin_service,
                        &persistence::db_user_driven_ports::DbReadUsers {},
                        &persistence::db_todo_driven_ports::DbTaskReader {},
                        &persistence::db_user_driven_ports::DbWriteUsers {},
                        &persistence::db_todo_driven_ports::DbTaskWriter {},
                    )
                    .await
                },
            ),
        )
        .route(
            "/admin/tasks/:task_id",
            delete(
                async |State(app_state): AppState,
                       AuthenticatedUser(session): AuthenticatedUser,
                       Path(task_id): Path<String>| {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let admin_service = domain::admin::AdminService {};

                    delete_task(
                        &session.user_id,
                        &task_id,
                        &mut ext_cxn,
                        &admin_service,
                        &persistence::db_user_driven_ports::DbReadUsers {},
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
    path = "/admin/users",
    tag = ADMIN_API_GROUP,
    params(dto::UserSearch),
    responses(
        (status = 200, description = "Matching users, each with all of their tasks", body = Vec<dto::AdminUserEntry>),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Lists users whose name starts with the search text, along with every task they own
async fn list_users(
    caller_id: &str,
    search: String,
    ext_cxn: &mut impl ExternalConnectivity,
    admin_service: &impl AdminPort,
    user_reader: &impl UserReader,
    task_reader: &impl TaskReader,
    clock: &impl Clock,
) -> Result<Json<Vec<dto::AdminUserEntry>>, AdminError> {
    let panel = admin_service
        .enter(caller_id, &mut *ext_cxn, user_reader, task_reader)
        .await?;
    let today = clock.today();

    let roster = panel
        .roster(&search)
        .into_iter()
        .map(|entry| dto::AdminUserEntry::on_day(entry, today))
        .collect();

    Ok(Json(roster))
}

#[utoipa::path(
    patch,
    path = "/admin/users/{user_id}",
    tag = ADMIN_API_GROUP,
    params(("user_id" = String, Path, description = "ID of the user to edit")),
    request_body = dto::UpdateProfile,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Edits the name and email of any user
#[allow(clippy::too_many_arguments)]
async fn edit_user(
    caller_id: &str,
    user_id: &str,
    update: dto::UpdateProfile,
    ext_cxn: &mut impl ExternalConnectivity,
    admin_service: &impl AdminPort,
    user_reader: &impl UserReader,
    task_reader: &impl TaskReader,
    user_writer: &impl UserWriter,
) -> Result<StatusCode, ErrorResponse> {
    info!("Admin {caller_id} editing user {user_id}");
    update.validate().map_err(ValidationErrorResponse::from)?;

    let panel = admin_service
        .enter(caller_id, &mut *ext_cxn, user_reader, task_reader)
        .await?;
    let domain_update = domain::user::UpdateProfile::from(update);
    admin_service
        .edit_user(&panel, user_id, &domain_update, &mut *ext_cxn, user_writer)
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/admin/users/{user_id}",
    tag = ADMIN_API_GROUP,
    params(("user_id" = String, Path, description = "ID of the user to delete")),
    responses(
        (status = 200, description = "User and every task they owned were deleted", body = dto::CascadeDeleted),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Deletes a user's tasks one at a time and then the user. Runs in one database transaction,
/// so an interrupted cascade leaves nothing deleted.
#[allow(clippy::too_many_arguments)]
async fn delete_user(
    caller_id: &str,
    user_id: &str,
    ext_cxn: &mut impl Transactable,
    admin_service: &impl AdminPort,
    user_reader: &impl UserReader,
    task_reader: &impl TaskReader,
    user_writer: &impl UserWriter,
    task_writer: &impl TaskWriter,
) -> Result<Json<dto::CascadeDeleted>, AdminError> {
    info!("Admin {caller_id} deleting user {user_id}");
    let panel = admin_service
        .enter(caller_id, &mut *ext_cxn, user_reader, task_reader)
        .await?;

    let mut txn = ext_cxn.start_transaction().await?;
    let cascade = admin_service
        .cascade_delete_user(&panel, user_id, &mut txn, user_writer, task_writer)
        .await;
    let deleted_task_ids = match cascade {
        Ok(deleted_task_ids) => deleted_task_ids,
        Err(AdminError::CascadeInterrupted { cause, .. }) => {
            // Dropping the uncommitted transaction rolls back the partial cascade
            drop(txn);
            return Err(AdminError::CascadeRolledBack(cause));
        }
        Err(other) => return Err(other),
    };
    txn.commit().await?;

    Ok(Json(dto::CascadeDeleted {
        user_id: user_id.to_owned(),
        deleted_task_ids,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/tasks/{task_id}",
    tag = ADMIN_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task to delete")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Deletes any user's task
async fn delete_task(
    caller_id: &str,
    task_id: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    admin_service: &impl AdminPort,
    user_reader: &impl UserReader,
    task_reader: &impl TaskReader,
    task_writer: &impl TaskWriter,
) -> Result<StatusCode, AdminError> {
    info!("Admin {caller_id} deleting task {task_id}");
    let panel = admin_service
        .enter(caller_id, &mut *ext_cxn, user_reader, task_reader)
        .await?;
    admin_service
        .delete_task(&panel, task_id, &mut *ext_cxn, task_writer)
        .await?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::expect_error;
    use crate::domain::admin::AdminService;
    use crate::domain::test_util::{FixedClock, date};
    use crate::domain::todo::test_util::{InMemoryUserTaskPersistence, NewTaskWithOwner};
    use crate::domain::user::test_util::{InMemoryUserPersistence, user_create_default};
    use crate::domain::user::{CreateUser, Role};
    use crate::external_connections::test_util::FakeExternalConnectivity;
    use axum::response::IntoResponse;
    use std::sync::RwLock;

    fn named(name: &str) -> CreateUser {
        CreateUser {
            name: name.to_owned(),
            ..user_create_default()
        }
    }

    fn users() -> RwLock<InMemoryUserPersistence> {
        let mut raw_persist = InMemoryUserPersistence::new_with_users(&[
            ("root", named("Root")),
            ("u", named("Alpha")),
            ("v", named("alfred")),
            ("w", named("Beta")),
        ]);
        raw_persist.users[0].role = Role::Admin;
        RwLock::new(raw_persist)
    }

    fn tasks() -> RwLock<InMemoryUserTaskPersistence> {
        RwLock::new(InMemoryUserTaskPersistence::new_with_tasks(&[
            NewTaskWithOwner::due("u", "A", date(2024, 3, 10)),
            NewTaskWithOwner::titled("u", "B"),
            NewTaskWithOwner::titled("v", "C"),
        ]))
    }

    mod list_users {
        use super::*;

        #[tokio::test]
        async fn search_filters_users_and_keeps_their_tasks() {
            let user_persist = users();
            let task_persist = tasks();

            let response = list_users(
                "root",
                "al".to_owned(),
                &mut FakeExternalConnectivity::new(),
                &AdminService {},
                &user_persist,
                &task_persist,
                &FixedClock::on(2024, 3, 10),
            )
            .await;

            let Ok(Json(roster)) = response else {
                panic!("admin listing failed");
            };
            let summary: Vec<_> = roster
                .iter()
                .map(|entry| (entry.user.id.as_str(), entry.tasks.len()))
                .collect();
            assert_eq!(vec![("u", 2), ("v", 1)], summary);
            assert!(roster[0].tasks[0].due_today);
        }

        #[tokio::test]
        async fn regular_users_are_forbidden() {
            let response = list_users(
                "u",
                String::new(),
                &mut FakeExternalConnectivity::new(),
                &AdminService {},
                &users(),
                &tasks(),
                &FixedClock::on(2024, 3, 10),
            )
            .await
            .into_response();

            let body = expect_error(response, StatusCode::FORBIDDEN).await;
            assert_eq!("forbidden", body.error_code);
        }
    }

    mod delete_user {
        use super::*;

        #[tokio::test]
        async fn removes_user_and_all_their_tasks() {
            let user_persist = users();
            let task_persist = tasks();

            let response = delete_user(
                "root",
                "u",
                &mut FakeExternalConnectivity::new(),
                &AdminService {},
                &user_persist,
                &task_persist,
                &user_persist,
                &task_persist,
            )
            .await;

            let Ok(Json(deleted)) = response else {
                panic!("cascade delete failed");
            };
            assert_eq!(vec!["task-1".to_owned(), "task-2".to_owned()], deleted.deleted_task_ids);

            let locked_users = user_persist.read().expect("user persist rw lock poisoned");
            assert!(locked_users.users.iter().all(|user| user.id != "u"));
            let locked_tasks = task_persist.read().expect("task persist rw lock poisoned");
            let remaining: Vec<_> = locked_tasks.tasks.iter().map(|task| task.id.as_str()).collect();
            assert_eq!(vec!["task-3"], remaining);
        }

        #[tokio::test]
        async fn interrupted_cascade_reports_rollback() {
            let user_persist = users();
            let task_persist = tasks();
            task_persist
                .write()
                .expect("task persist rw lock poisoned")
                .fail_deletes_of = vec!["task-2".to_owned()];

            let response = delete_user(
                "root",
                "u",
                &mut FakeExternalConnectivity::new(),
                &AdminService {},
                &user_persist,
                &task_persist,
                &user_persist,
                &task_persist,
            )
            .await
            .into_response();

            let body = expect_error(response, StatusCode::INTERNAL_SERVER_ERROR).await;
            assert_eq!("internal_error", body.error_code);
            assert_eq!(
                Some(serde_json::json!("Nothing was deleted")),
                body.extra_info
            );
        }

        #[tokio::test]
        async fn unknown_user_is_404() {
            let response = delete_user(
                "root",
                "ghost",
                &mut FakeExternalConnectivity::new(),
                &AdminService {},
                &users(),
                &tasks(),
                &users(),
                &tasks(),
            )
            .await
            .into_response();

            let body = expect_error(response, StatusCode::NOT_FOUND).await;
            assert_eq!("not_found", body.error_code);
        }
    }

    #[tokio::test]
    async fn admins_edit_other_profiles() {
        let user_persist = users();
        let task_persist = tasks();

        let response = edit_user(
            "root",
            "w",
            dto::UpdateProfile {
                name: "Beta Prime".to_owned(),
                email: "beta@example.com".to_owned(),
            },
            &mut FakeExternalConnectivity::new(),
            &AdminService {},
            &user_persist,
            &task_persist,
            &user_persist,
        )
        .await;
        assert!(matches!(response, Ok(StatusCode::OK)));

        let locked_users = user_persist.read().expect("user persist rw lock poisoned");
        let edited = locked_users
            .users
            .iter()
            .find(|user| user.id == "w")
            .expect("edited user vanished");
        assert_eq!("Beta Prime", edited.name);
    }

    #[tokio::test]
    async fn admins_delete_any_task() {
        let task_persist = tasks();

        let response = delete_task(
            "root",
            "task-3",
            &mut FakeExternalConnectivity::new(),
            &AdminService {},
            &users(),
            &task_persist,
            &task_persist,
        )
        .await;
        assert!(matches!(response, Ok(StatusCode::OK)));
        assert_eq!(
            2,
            task_persist
                .read()
                .expect("task persist rw lock poisoned")
                .tasks
                .len()
        );
    }
}
