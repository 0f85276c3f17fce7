use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use kanban_core::types::{NewTask, Task, TaskChanges};
use serde::Deserialize;

use super::{api_error, json_body, storage_error, ActingUser, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MoveTaskBody {
    #[serde(default)]
    column_id: String,
}

pub async fn list_column_tasks(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id)): Path<(String, String)>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .service
        .list_column_tasks(&user, &board_id, &column_id)
        .await
        .map_err(|e| storage_error("kanban.api.list_column_tasks", e))?;
    Ok(Json(tasks))
}

pub async fn list_board_tasks(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .service
        .list_board_tasks(&user, &board_id)
        .await
        .map_err(|e| storage_error("kanban.api.list_board_tasks", e))?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id)): Path<(String, String)>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let new_task = json_body("kanban.api.create_task", body)?;
    let task = state
        .service
        .create_task(&user, &board_id, &column_id, &new_task)
        .await
        .map_err(|e| storage_error("kanban.api.create_task", e))?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id, task_id)): Path<(String, String, String)>,
    body: Result<Json<TaskChanges>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let changes = json_body("kanban.api.update_task", body)?;
    let task = state
        .service
        .update_task(&user, &board_id, &column_id, &task_id, &changes)
        .await
        .map_err(|e| storage_error("kanban.api.update_task", e))?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id, task_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_task(&user, &board_id, &column_id, &task_id)
        .await
        .map_err(|e| storage_error("kanban.api.delete_task", e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_task(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, task_id)): Path<(String, String)>,
    body: Result<Json<MoveTaskBody>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let body = json_body("kanban.api.move_task", body)?;
    let column_id = body.column_id.trim();
    if column_id.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "kanban.api.move_task",
            "column_id is required",
        ));
    }
    let task = state
        .service
        .move_task(&user, &board_id, &task_id, column_id)
        .await
        .map_err(|e| storage_error("kanban.api.move_task", e))?;
    Ok(Json(task))
}
