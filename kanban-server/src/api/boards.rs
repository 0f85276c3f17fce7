use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use kanban_core::types::Board;
use serde::Deserialize;

use super::{json_body, storage_error, ActingUser, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BoardBody {
    name: String,
}

pub async fn list_boards(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> Result<Json<Vec<Board>>, ApiError> {
    let boards = state
        .service
        .list_boards(&user)
        .await
        .map_err(|e| storage_error("kanban.api.list_boards", e))?;
    Ok(Json(boards))
}

pub async fn create_board(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    body: Result<Json<BoardBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let body = json_body("kanban.api.create_board", body)?;
    let board = state
        .service
        .create_board(&user, &body.name)
        .await
        .map_err(|e| storage_error("kanban.api.create_board", e))?;
    Ok((StatusCode::CREATED, Json(board)))
}

pub async fn get_board(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
) -> Result<Json<Board>, ApiError> {
    let board = state
        .service
        .get_board(&user, &board_id)
        .await
        .map_err(|e| storage_error("kanban.api.get_board", e))?;
    Ok(Json(board))
}

pub async fn rename_board(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
    body: Result<Json<BoardBody>, JsonRejection>,
) -> Result<Json<Board>, ApiError> {
    let body = json_body("kanban.api.rename_board", body)?;
    let board = state
        .service
        .rename_board(&user, &board_id, &body.name)
        .await
        .map_err(|e| storage_error("kanban.api.rename_board", e))?;
    Ok(Json(board))
}

pub async fn delete_board(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(board_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_board(&user, &board_id)
        .await
        .map_err(|e| storage_error("kanban.api.delete_board", e))?;
    Ok(StatusCode::NO_CONTENT)
}
