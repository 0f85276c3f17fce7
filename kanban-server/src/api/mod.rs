use axum::{
    extract::{rejection::JsonRejection, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::{get, patch, put},
    Router,
};
use kanban_core::{ErrorKind, StorageError};
use serde::Serialize;

mod boards;
mod columns;
mod tasks;

use crate::state::AppState;

/// Axum REST API routes, mounted under `/api/v1`.
///
///   GET    /boards                                              -> list the caller's boards
///   POST   /boards                                              -> create a board
///   GET    /boards/:boardId                                     -> one board
///   PUT    /boards/:boardId                                     -> rename a board
///   DELETE /boards/:boardId                                     -> delete a board with its columns and tasks
///   GET    /boards/:boardId/columns                             -> columns in position order
///   POST   /boards/:boardId/columns                             -> append a column
///   PUT    /boards/:boardId/columns/:columnId                   -> rename and/or reposition a column
///   DELETE /boards/:boardId/columns/:columnId                   -> delete a column and compact the board
///   GET    /boards/:boardId/columns/:columnId/tasks             -> tasks in position order
///   POST   /boards/:boardId/columns/:columnId/tasks             -> append a task
///   PUT    /boards/:boardId/columns/:columnId/tasks/:taskId     -> edit and/or reposition a task
///   DELETE /boards/:boardId/columns/:columnId/tasks/:taskId     -> delete a task and compact the column
///   GET    /boards/:boardId/tasks                               -> every task on the board
///   PATCH  /boards/:boardId/tasks/:taskId/move                  -> move a task to the end of another column
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route(
            "/boards/{board_id}",
            get(boards::get_board)
                .put(boards::rename_board)
                .delete(boards::delete_board),
        )
        .route(
            "/boards/{board_id}/columns",
            get(columns::list_columns).post(columns::create_column),
        )
        .route(
            "/boards/{board_id}/columns/{column_id}",
            put(columns::update_column).delete(columns::delete_column),
        )
        .route(
            "/boards/{board_id}/columns/{column_id}/tasks",
            get(tasks::list_column_tasks).post(tasks::create_task),
        )
        .route(
            "/boards/{board_id}/columns/{column_id}/tasks/{task_id}",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/boards/{board_id}/tasks", get(tasks::list_board_tasks))
        .route(
            "/boards/{board_id}/tasks/{task_id}/move",
            patch(tasks::move_task),
        )
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

fn api_error(status: StatusCode, target: &'static str, error: impl Into<String>) -> ApiError {
    let error = error.into();
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

/// Map a core error to its status code. System failures are logged in full
/// but answered with a generic message.
fn storage_error(target: &'static str, err: StorageError) -> ApiError {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log_api_issue(status, target, err.to_string());
    let error = if status.is_server_error() {
        "internal server error".to_string()
    } else {
        err.to_string()
    };
    (status, Json(ErrorResponse { error }))
}

/// Unwrap a JSON body, answering malformed input with the usual error shape.
fn json_body<T>(target: &'static str, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(api_error(
            StatusCode::BAD_REQUEST,
            target,
            format!("invalid json: {}", rejection.body_text()),
        )),
    }
}

/// The acting user, as established by the authentication layer in front of
/// this service and passed in the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct ActingUser(pub String);

pub const USER_HEADER: &str = "x-user-id";

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| ActingUser(user.to_string()))
            .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "kanban.api.auth", "unauthorized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_status_mapping() {
        let cases = [
            (StorageError::NotFound, StatusCode::NOT_FOUND, "not found"),
            (
                StorageError::Conflict("duplicate".to_string()),
                StatusCode::CONFLICT,
                "conflict: duplicate",
            ),
            (
                StorageError::InvalidInput("name must not be empty".to_string()),
                StatusCode::BAD_REQUEST,
                "invalid input: name must not be empty",
            ),
            (
                StorageError::Injected("update_task"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ),
        ];
        for (err, status, message) in cases {
            let (actual, Json(body)) = storage_error("kanban.api.test", err);
            assert_eq!(actual, status);
            assert_eq!(body.error, message);
        }
    }
}
