use crate::domain;
use crate::dto::task::TaskResponse;
use crate::dto::user::UserProfile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// DTO for one row of the admin panel: a user and every task they own
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct AdminUserEntry {
    pub user: UserProfile,
    pub tasks: Vec<TaskResponse>,
}

impl AdminUserEntry {
    pub fn on_day(entry: domain::admin::UserWithTasks, today: NaiveDate) -> AdminUserEntry {
        AdminUserEntry {
            user: entry.user.into(),
            tasks: entry
                .tasks
                .into_iter()
                .map(|task| TaskResponse::on_day(task, today))
                .collect(),
        }
    }
}

/// Optional case-insensitive name prefix filter for the admin roster
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct UserSearch {
    pub search: Option<String>,
}

/// DTO listing what a cascade delete removed
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct CascadeDeleted {
    pub user_id: String,
    pub deleted_task_ids: Vec<String>,
}
