//! Task CRUD.
//!
//! The owner of a new task is always the caller. For existing tasks the handler
//! loads the task first and then asks the guard about its owner.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{is_current_admin, missing_resource};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        state::AppState,
    },
    identity::{Capability, Identity},
    tasks::{NewTask, Task, TaskChanges, normalize_description, normalize_title},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Load a task the caller may act on.
fn owned_task(state: &AppState, identity: &Identity, id: i64) -> Result<Task, ApiError> {
    let Some(task) = state.tasks.get(id)? else {
        return Err(missing_resource(state, identity));
    };
    state
        .guard
        .check(identity, Capability::OwnerOrAdmin(task.user_id))?;
    Ok(task)
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "The caller's tasks; every task for admins", body = [Task]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let owner = if is_current_admin(&state, &identity)? {
        None
    } else {
        Some(identity.user_id)
    };
    Ok(Json(state.tasks.list(owner)?))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created for the caller", body = Task),
        (status = 400, description = "Invalid title or description", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn create_task(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: Option<Json<CreateTaskRequest>>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    let title = normalize_title(&request.title).map_err(ApiError::Validation)?;
    let description = normalize_description(request.description.as_deref().unwrap_or_default())
        .map_err(ApiError::Validation)?;

    let task = state.tasks.create(NewTask {
        user_id: identity.user_id,
        title,
        description,
    })?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's task", body = ErrorBody),
        (status = 404, description = "No such task (admins only)", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn get_task(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(owned_task(&state, &identity, id)?))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = Task),
        (status = 400, description = "Invalid title or description", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's task", body = ErrorBody),
        (status = 404, description = "No such task (admins only)", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn update_task(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    payload: Option<Json<UpdateTaskRequest>>,
) -> Result<Json<Task>, ApiError> {
    let task = owned_task(&state, &identity, id)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };

    let changes = TaskChanges {
        title: request
            .title
            .as_deref()
            .map(normalize_title)
            .transpose()
            .map_err(ApiError::Validation)?,
        description: request
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()
            .map_err(ApiError::Validation)?,
        completed: request.completed,
    };
    Ok(Json(state.tasks.update(task.id, changes)?))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's task", body = ErrorBody),
        (status = 404, description = "No such task (admins only)", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn delete_task(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let task = owned_task(&state, &identity, id)?;
    state.tasks.delete(task.id)?;
    Ok(StatusCode::NO_CONTENT)
}
