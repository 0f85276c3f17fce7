/// Cross-column task move.
///
/// The whole relocation happens inside the caller's transaction:
///
/// 1. board ownership, board row held `FOR SHARE`, and a plain read of the
///    task by `(id, board_id)` to learn its source column
/// 2. source and destination column rows, locked in ascending id order; the
///    destination must sit on the same board
/// 3. a fresh read of the task; if a concurrent move took it elsewhere while
///    we waited, lock its new column as well and read again
/// 4. the task row itself, which cannot leave a column we hold
/// 5. close the gap the task leaves in the source column
/// 6. append the task at the end of the destination column
/// 7. write the task's new column and position
///
/// Column rows are locked before any task row: compaction writes every later
/// sibling in the column, so a writer holding a task lock while waiting for
/// its column could deadlock with the column's current holder. A column
/// picked up in step 3 may be locked out of id order; a deadlock there is
/// detected by the database and surfaces as a system error.
///
/// Every failure is returned to the caller, who rolls the transaction back,
/// so a half-finished move is never committed.
use crate::ordering;
use crate::ownership::{self, Locking, Target};
use crate::storage::{LockMode, StorageError, Transaction};
use crate::types::{Container, Task};

/// Where a moved task came from, alongside its new state.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub task: Task,
    pub from_column_id: String,
    pub from_position: i32,
}

pub async fn move_task(
    tx: &mut dyn Transaction,
    actor: &str,
    board_id: &str,
    task_id: &str,
    destination_id: &str,
) -> Result<MoveOutcome, StorageError> {
    let target = Target::Task {
        board_id,
        column_id: None,
        task_id,
    };
    let (_, seen) = ownership::resolve(tx, actor, target, Locking::GUARD_BOARD)
        .await?
        .task()?;
    let mut source_id = seen.column_id;

    let mut held: Vec<String> = Vec::new();
    loop {
        let mut wanted: Vec<&str> = [source_id.as_str(), destination_id]
            .into_iter()
            .filter(|id| !held.iter().any(|h| h.as_str() == *id))
            .collect();
        wanted.sort_unstable();
        wanted.dedup();
        for column_id in wanted {
            tx.lock_column(column_id, board_id, LockMode::Exclusive)
                .await?
                .ok_or(StorageError::NotFound)?;
            held.push(column_id.to_string());
        }

        let current = tx
            .lock_task(task_id, board_id, LockMode::None)
            .await?
            .ok_or(StorageError::NotFound)?;
        if current.column_id == source_id {
            break;
        }
        log::debug!(
            target: "kanban.moves.move",
            "Task {} left column {} for {} while waiting, following it",
            task_id,
            source_id,
            current.column_id
        );
        source_id = current.column_id;
    }

    let mut task = tx
        .lock_task(task_id, board_id, LockMode::Exclusive)
        .await?
        .ok_or(StorageError::NotFound)?;
    let from_position = task.position;

    ordering::close_gap(tx, Container::Column(&source_id), from_position).await?;
    let position =
        ordering::next_position(tx, Container::Column(destination_id), Some(&task.id)).await?;

    task.column_id = destination_id.to_string();
    task.position = position;
    let task = tx.update_task(&task).await?;

    Ok(MoveOutcome {
        task,
        from_column_id: source_id,
        from_position,
    })
}
