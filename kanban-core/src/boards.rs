/// Board operations. A board is the root of the ownership chain; its row
/// lock also guards the order of its columns.
use crate::ownership;
use crate::storage::{LockMode, StorageError, Transaction};
use crate::types::Board;

pub async fn create(
    tx: &mut dyn Transaction,
    actor: &str,
    name: &str,
) -> Result<Board, StorageError> {
    tx.insert_board(actor, name).await
}

pub async fn list(tx: &mut dyn Transaction, actor: &str) -> Result<Vec<Board>, StorageError> {
    tx.list_boards(actor).await
}

pub async fn get(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
) -> Result<Board, StorageError> {
    ownership::owned_board(tx, actor, board_id, LockMode::None).await
}

pub async fn rename(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    name: &str,
) -> Result<Board, StorageError> {
    let mut board = ownership::owned_board(tx, actor, board_id, LockMode::Exclusive).await?;
    board.name = name.to_string();
    tx.update_board(&board).await
}

/// Delete a board together with its columns and tasks.
pub async fn delete(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
) -> Result<Board, StorageError> {
    let board = ownership::owned_board(tx, actor, board_id, LockMode::Exclusive).await?;
    tx.delete_board(&board.id).await?;
    Ok(board)
}
