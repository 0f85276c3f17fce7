use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use kanban_core::types::{Column, ColumnChanges};
use serde::Deserialize;

use super::{json_body, storage_error, ActingUser, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateColumnBody {
    name: String,
}

pub async fn list_columns(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
) -> Result<Json<Vec<Column>>, ApiError> {
    let columns = state
        .service
        .list_columns(&user, &board_id)
        .await
        .map_err(|e| storage_error("kanban.api.list_columns", e))?;
    Ok(Json(columns))
}

pub async fn create_column(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
    body: Result<Json<CreateColumnBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Column>), ApiError> {
    let body = json_body("kanban.api.create_column", body)?;
    let column = state
        .service
        .create_column(&user, &board_id, &body.name)
        .await
        .map_err(|e| storage_error("kanban.api.create_column", e))?;
    Ok((StatusCode::CREATED, Json(column)))
}

pub async fn update_column(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id)): Path<(String, String)>,
    body: Result<Json<ColumnChanges>, JsonRejection>,
) -> Result<Json<Column>, ApiError> {
    let changes = json_body("kanban.api.update_column", body)?;
    let column = state
        .service
        .update_column(&user, &board_id, &column_id, &changes)
        .await
        .map_err(|e| storage_error("kanban.api.update_column", e))?;
    Ok(Json(column))
}

pub async fn delete_column(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((board_id, column_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_column(&user, &board_id, &column_id)
        .await
        .map_err(|e| storage_error("kanban.api.delete_column", e))?;
    Ok(StatusCode::NO_CONTENT)
}
