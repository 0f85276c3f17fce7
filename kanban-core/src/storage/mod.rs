pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{Board, Column, Container, Task};

/// Row lock taken by a read inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Plain read, no row lock.
    None,
    /// `FOR SHARE`: blocks writers of the row, not other sharers.
    Share,
    /// `FOR UPDATE`: exclusive for the rest of the transaction.
    Exclusive,
}

/// A storage backend able to open transactions.
/// Implementations: MemoryStore (process-local), PgStore (PostgreSQL).
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Row-level primitives executed inside one open transaction.
///
/// Lookups that return `None` mean "no such row for that parent"; callers turn
/// that into `StorageError::NotFound`. Every list is ordered by `position`,
/// then `created_at`.
#[async_trait]
pub trait Transaction: Send {
    async fn lock_board(
        &mut self,
        board_id: &str,
        owner_id: &str,
        mode: LockMode,
    ) -> Result<Option<Board>, StorageError>;

    async fn lock_column(
        &mut self,
        column_id: &str,
        board_id: &str,
        mode: LockMode,
    ) -> Result<Option<Column>, StorageError>;

    async fn lock_task(
        &mut self,
        task_id: &str,
        board_id: &str,
        mode: LockMode,
    ) -> Result<Option<Task>, StorageError>;

    /// Highest sibling position in the container, 0 when empty. `exclude`
    /// leaves one sibling out of the scan.
    async fn max_position(
        &mut self,
        container: Container<'_>,
        exclude: Option<&str>,
    ) -> Result<i32, StorageError>;

    /// Add `delta` to the position of every sibling with `position >= from`,
    /// skipping `exclude`. Returns the number of rows shifted.
    async fn shift_positions(
        &mut self,
        container: Container<'_>,
        from: i32,
        delta: i32,
        exclude: Option<&str>,
    ) -> Result<u64, StorageError>;

    async fn insert_board(&mut self, owner_id: &str, name: &str) -> Result<Board, StorageError>;

    async fn insert_column(
        &mut self,
        board_id: &str,
        name: &str,
        position: i32,
    ) -> Result<Column, StorageError>;

    async fn insert_task(
        &mut self,
        column: &Column,
        title: &str,
        description: &str,
        position: i32,
    ) -> Result<Task, StorageError>;

    /// Persist the board's name and refresh `updated_at`.
    async fn update_board(&mut self, board: &Board) -> Result<Board, StorageError>;

    /// Persist the column's name and position and refresh `updated_at`.
    async fn update_column(&mut self, column: &Column) -> Result<Column, StorageError>;

    /// Persist the task's column, content and position and refresh `updated_at`.
    async fn update_task(&mut self, task: &Task) -> Result<Task, StorageError>;

    /// Delete a board with all of its columns and tasks.
    async fn delete_board(&mut self, board_id: &str) -> Result<(), StorageError>;

    /// Delete a column with all of its tasks.
    async fn delete_column(&mut self, column_id: &str) -> Result<(), StorageError>;

    async fn delete_task(&mut self, task_id: &str) -> Result<(), StorageError>;

    async fn list_boards(&mut self, owner_id: &str) -> Result<Vec<Board>, StorageError>;

    async fn list_columns(&mut self, board_id: &str) -> Result<Vec<Column>, StorageError>;

    async fn list_column_tasks(&mut self, column_id: &str) -> Result<Vec<Task>, StorageError>;

    async fn list_board_tasks(&mut self, board_id: &str) -> Result<Vec<Task>, StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Coarse classification the transport layer maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    System,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The entity or one of its ownership ancestors is missing or belongs to
    /// someone else. Deliberately carries no detail.
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("injected failure in {0}")]
    Injected(&'static str),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound => ErrorKind::NotFound,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::InvalidInput(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::System,
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::Conflict(db.message().to_string())
            }
            other => StorageError::Database(other),
        }
    }
}
