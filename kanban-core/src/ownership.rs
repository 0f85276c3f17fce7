/// Ownership guard: resolves an entity's chain up to the board's owner.
///
/// One capability for every entity kind, used by read and write paths alike.
/// The board is always resolved first, by `(id, owner_id)`, then the leaf by
/// `(id, board_id)`. A miss at any link is reported as `NotFound`, whichever
/// link it was.
use crate::storage::{LockMode, StorageError, Transaction};
use crate::types::{Board, Column, Task};

/// The entity whose ownership is being checked.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Board {
        board_id: &'a str,
    },
    Column {
        board_id: &'a str,
        column_id: &'a str,
    },
    /// A task addressed by board, optionally narrowed to the column the
    /// caller believes it lives in.
    Task {
        board_id: &'a str,
        column_id: Option<&'a str>,
        task_id: &'a str,
    },
}

/// Row locks taken while resolving: one for the board row, one for the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locking {
    pub board: LockMode,
    pub leaf: LockMode,
}

impl Locking {
    /// Plain reads, for listing.
    pub const READ: Locking = Locking {
        board: LockMode::None,
        leaf: LockMode::None,
    };

    /// Board held against deletion, leaf read without a lock.
    pub const GUARD_BOARD: Locking = Locking {
        board: LockMode::Share,
        leaf: LockMode::None,
    };

    /// Board held against deletion, leaf held for mutation.
    pub const MUTATE_LEAF: Locking = Locking {
        board: LockMode::Share,
        leaf: LockMode::Exclusive,
    };

    /// Board held exclusively, which serializes changes to its column order.
    pub const MUTATE_BOARD: Locking = Locking {
        board: LockMode::Exclusive,
        leaf: LockMode::Exclusive,
    };
}

/// A resolved ownership chain.
#[derive(Debug, Clone)]
pub struct Chain {
    pub board: Board,
    pub column: Option<Column>,
    pub task: Option<Task>,
}

impl Chain {
    pub fn column(self) -> Result<(Board, Column), StorageError> {
        match self.column {
            Some(column) => Ok((self.board, column)),
            None => Err(StorageError::NotFound),
        }
    }

    pub fn task(self) -> Result<(Board, Task), StorageError> {
        match self.task {
            Some(task) => Ok((self.board, task)),
            None => Err(StorageError::NotFound),
        }
    }
}

/// Resolve `target` for `actor` inside `tx`, taking the requested locks.
pub async fn resolve(
    tx: &mut dyn Transaction,
    actor: &str,
    target: Target<'_>,
    locking: Locking,
) -> Result<Chain, StorageError> {
    let board_id = match target {
        Target::Board { board_id }
        | Target::Column { board_id, .. }
        | Target::Task { board_id, .. } => board_id,
    };

    let board = tx
        .lock_board(board_id, actor, locking.board)
        .await?
        .ok_or(StorageError::NotFound)?;

    let mut chain = Chain {
        board,
        column: None,
        task: None,
    };

    match target {
        Target::Board { .. } => {}
        Target::Column { column_id, .. } => {
            let column = tx
                .lock_column(column_id, board_id, locking.leaf)
                .await?
                .ok_or(StorageError::NotFound)?;
            chain.column = Some(column);
        }
        Target::Task {
            column_id, task_id, ..
        } => {
            let task = tx
                .lock_task(task_id, board_id, locking.leaf)
                .await?
                .ok_or(StorageError::NotFound)?;
            if column_id.is_some_and(|expected| expected != task.column_id) {
                return Err(StorageError::NotFound);
            }
            chain.task = Some(task);
        }
    }

    Ok(chain)
}

/// Shorthand for resolving just a board.
pub async fn owned_board(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    mode: LockMode,
) -> Result<Board, StorageError> {
    let locking = Locking {
        board: mode,
        leaf: LockMode::None,
    };
    let chain = resolve(tx, actor, Target::Board { board_id }, locking).await?;
    Ok(chain.board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::storage::Store;

    #[tokio::test]
    async fn test_resolve_full_chain() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let board = tx.insert_board("alice", "Work").await.unwrap();
        let column = tx.insert_column(&board.id, "Todo", 1).await.unwrap();
        let task = tx.insert_task(&column, "Write", "", 1).await.unwrap();

        let target = Target::Task {
            board_id: &board.id,
            column_id: Some(&column.id),
            task_id: &task.id,
        };
        let (resolved_board, resolved_task) = resolve(tx.as_mut(), "alice", target, Locking::READ)
            .await
            .unwrap()
            .task()
            .unwrap();
        assert_eq!(resolved_board.id, board.id);
        assert_eq!(resolved_task.id, task.id);
    }

    #[tokio::test]
    async fn test_every_broken_link_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let board = tx.insert_board("alice", "Work").await.unwrap();
        let other = tx.insert_board("alice", "Home").await.unwrap();
        let column = tx.insert_column(&board.id, "Todo", 1).await.unwrap();
        let elsewhere = tx.insert_column(&other.id, "Todo", 1).await.unwrap();
        let task = tx.insert_task(&column, "Write", "", 1).await.unwrap();

        let cases = [
            // foreign owner
            ("mallory", Target::Board { board_id: &board.id }),
            // missing board
            ("alice", Target::Board { board_id: "nope" }),
            // column on another board
            (
                "alice",
                Target::Column {
                    board_id: &board.id,
                    column_id: &elsewhere.id,
                },
            ),
            // task addressed through the wrong column
            (
                "alice",
                Target::Task {
                    board_id: &board.id,
                    column_id: Some(&elsewhere.id),
                    task_id: &task.id,
                },
            ),
            // task addressed through the wrong board
            (
                "alice",
                Target::Task {
                    board_id: &other.id,
                    column_id: None,
                    task_id: &task.id,
                },
            ),
        ];

        for (actor, target) in cases {
            let result = resolve(tx.as_mut(), actor, target, Locking::READ).await;
            assert!(
                matches!(result, Err(StorageError::NotFound)),
                "expected NotFound for {:?}",
                target
            );
        }
    }

    #[tokio::test]
    async fn test_board_target_has_no_leaf() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let board = tx.insert_board("alice", "Work").await.unwrap();
        let chain = resolve(
            tx.as_mut(),
            "alice",
            Target::Board { board_id: &board.id },
            Locking::READ,
        )
        .await
        .unwrap();
        assert!(matches!(chain.column(), Err(StorageError::NotFound)));
    }
}
