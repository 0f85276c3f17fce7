/// Column operations. Every write holds the board row exclusively, which
/// serializes all changes to one board's column order.
use crate::ordering;
use crate::ownership::{self, Locking, Target};
use crate::storage::{LockMode, StorageError, Transaction};
use crate::types::{Column, Container};

/// Append a column at the end of the board.
pub async fn create(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    name: &str,
) -> Result<Column, StorageError> {
    let board = ownership::owned_board(tx, actor, board_id, LockMode::Exclusive).await?;
    let position = ordering::next_position(tx, Container::Board(&board.id), None).await?;
    tx.insert_column(&board.id, name, position).await
}

pub async fn list(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
) -> Result<Vec<Column>, StorageError> {
    let board = ownership::owned_board(tx, actor, board_id, LockMode::None).await?;
    tx.list_columns(&board.id).await
}

/// Rename and/or reposition a column. A position of `None` or 0 keeps the
/// current one; anything else is clamped to the board's range.
pub async fn update(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
    name: Option<&str>,
    position: Option<i32>,
) -> Result<Column, StorageError> {
    let target = Target::Column {
        board_id,
        column_id,
    };
    let (board, mut column) = ownership::resolve(tx, actor, target, Locking::MUTATE_BOARD)
        .await?
        .column()?;

    if let Some(name) = name {
        column.name = name.to_string();
    }
    if let Some(requested) = position.filter(|p| *p != 0) {
        column.position = ordering::reposition(
            tx,
            Container::Board(&board.id),
            &column.id,
            column.position,
            requested,
        )
        .await?;
    }
    tx.update_column(&column).await
}

/// Delete a column with its tasks and close the gap in the board.
pub async fn delete(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    column_id: &str,
) -> Result<Column, StorageError> {
    let target = Target::Column {
        board_id,
        column_id,
    };
    let (board, column) = ownership::resolve(tx, actor, target, Locking::MUTATE_BOARD)
        .await?
        .column()?;

    tx.delete_column(&column.id).await?;
    ordering::close_gap(tx, Container::Board(&board.id), column.position).await?;
    Ok(column)
}
