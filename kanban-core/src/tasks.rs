/// Task operations within one column. Moving a task to another column is
/// in `moves`.
///
/// Writes hold the board row `FOR SHARE` and the column row `FOR UPDATE`;
/// a task row is locked only after its column.
use crate::ordering;
use crate::ownership::{self, Locking, Target};
use crate::storage::{LockMode, StorageError, Transaction};
use crate::types::{Container, Task};

/// Append a task at the end of the column.
pub async fn create(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
    title: &str,
    description: &str,
) -> Result<Task, StorageError> {
    let target = Target::Column {
        board_id,
        column_id,
    };
    let (_, column) = ownership::resolve(tx, actor, target, Locking::MUTATE_LEAF)
        .await?
        .column()?;
    let position = ordering::next_position(tx, Container::Column(&column.id), None).await?;
    tx.insert_task(&column, title, description, position).await
}

pub async fn list_in_column(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
) -> Result<Vec<Task>, StorageError> {
    let target = Target::Column {
        board_id,
        column_id,
    };
    let (_, column) = ownership::resolve(tx, actor, target, Locking::READ)
        .await?
        .column()?;
    tx.list_column_tasks(&column.id).await
}

pub async fn list_on_board(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
) -> Result<Vec<Task>, StorageError> {
    let board = ownership::owned_board(tx, actor, board_id, LockMode::None).await?;
    tx.list_board_tasks(&board.id).await
}

/// Task content change and/or reorder inside its column.
#[derive(Debug, Clone, Copy, Default)]
pub struct Edit<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub position: Option<i32>,
}

pub async fn update(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
    task_id: &str,
    edit: Edit<'_>,
) -> Result<Task, StorageError> {
    let mut task = lock_in_column(tx, actor, board_id, column_id, task_id).await?;

    if let Some(title) = edit.title {
        task.title = title.to_string();
    }
    if let Some(description) = edit.description {
        task.description = description.to_string();
    }
    if let Some(requested) = edit.position.filter(|p| *p != 0) {
        task.position = ordering::reposition(
            tx,
            Container::Column(column_id),
            &task.id,
            task.position,
            requested,
        )
        .await?;
    }
    tx.update_task(&task).await
}

/// Delete a task and close the gap it leaves in its column.
pub async fn delete(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
    task_id: &str,
) -> Result<Task, StorageError> {
    let task = lock_in_column(tx, actor, board_id, column_id, task_id).await?;
    tx.delete_task(&task.id).await?;
    ordering::close_gap(tx, Container::Column(&task.column_id), task.position).await?;
    Ok(task)
}

/// Resolve a task addressed through its column, locking the column and then
/// the task.
async fn lock_in_column(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
    task_id: &str,
) -> Result<Task, StorageError> {
    let target = Target::Column {
        board_id,
        column_id,
    };
    let (_, column) = ownership::resolve(tx, actor, target, Locking::MUTATE_LEAF)
        .await?
        .column()?;
    tx.lock_task(task_id, board_id, LockMode::Exclusive)
        .await?
        .filter(|task| task.column_id == column.id)
        .ok_or(StorageError::NotFound)
}
