/// Operation facade over a `Store`.
///
/// Each public method validates its input, opens one transaction, runs the
/// operation against it and commits. A failure rolls the transaction back
/// and is returned as is. `begin` and the work run under the service's
/// deadline; when it expires the in-flight future is dropped, which discards
/// the transaction, and `StorageError::Timeout` is returned. Commit and
/// rollback run after the deadline check.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::moves::{self, MoveOutcome};
use crate::storage::{StorageError, Store, Transaction};
use crate::tasks::Edit;
use crate::types::{Board, Column, ColumnChanges, NewTask, Task, TaskChanges};
use crate::{boards, columns, tasks};

#[derive(Clone)]
pub struct KanbanService {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl KanbanService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// A copy of this service that uses another per-operation deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            store: self.store.clone(),
            timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    // -- Boards --

    pub async fn create_board(&self, actor: &str, name: &str) -> Result<Board, StorageError> {
        let actor = require_actor(actor)?;
        let name = required("name", name)?;
        let board = self
            .deadline("create_board", async {
                let mut tx = self.store.begin().await?;
                let result = boards::create(tx.as_mut(), actor, name).await;
                pending(tx, result)
            })
            .await?;
        log::info!(target: "kanban.boards.create", "Created board {} for {}", board.id, actor);
        Ok(board)
    }

    pub async fn list_boards(&self, actor: &str) -> Result<Vec<Board>, StorageError> {
        let actor = require_actor(actor)?;
        self.deadline("list_boards", async {
            let mut tx = self.store.begin().await?;
            let result = boards::list(tx.as_mut(), actor).await;
            pending(tx, result)
        })
        .await
    }

    pub async fn get_board(&self, actor: &str, board_id: &str) -> Result<Board, StorageError> {
        let actor = require_actor(actor)?;
        self.deadline("get_board", async {
            let mut tx = self.store.begin().await?;
            let result = boards::get(tx.as_mut(), actor, board_id).await;
            pending(tx, result)
        })
        .await
    }

    pub async fn rename_board(
        &self,
        actor: &str,
        board_id: &str,
        name: &str,
    ) -> Result<Board, StorageError> {
        let actor = require_actor(actor)?;
        let name = required("name", name)?;
        let board = self
            .deadline("rename_board", async {
                let mut tx = self.store.begin().await?;
                let result = boards::rename(tx.as_mut(), actor, board_id, name).await;
                pending(tx, result)
            })
            .await?;
        log::info!(target: "kanban.boards.rename", "Renamed board {}", board.id);
        Ok(board)
    }

    pub async fn delete_board(&self, actor: &str, board_id: &str) -> Result<(), StorageError> {
        let actor = require_actor(actor)?;
        let board = self
            .deadline("delete_board", async {
                let mut tx = self.store.begin().await?;
                let result = boards::delete(tx.as_mut(), actor, board_id).await;
                pending(tx, result)
            })
            .await?;
        log::info!(target: "kanban.boards.delete", "Deleted board {} ({})", board.id, board.name);
        Ok(())
    }

    // -- Columns --

    pub async fn create_column(
        &self,
        actor: &str,
        board_id: &str,
        name: &str,
    ) -> Result<Column, StorageError> {
        let actor = require_actor(actor)?;
        let name = required("name", name)?;
        let column = self
            .deadline("create_column", async {
                let mut tx = self.store.begin().await?;
                let result = columns::create(tx.as_mut(), actor, board_id, name).await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.columns.create",
            "Created column {} on board {} at position {}",
            column.id,
            column.board_id,
            column.position
        );
        Ok(column)
    }

    pub async fn list_columns(
        &self,
        actor: &str,
        board_id: &str,
    ) -> Result<Vec<Column>, StorageError> {
        let actor = require_actor(actor)?;
        self.deadline("list_columns", async {
            let mut tx = self.store.begin().await?;
            let result = columns::list(tx.as_mut(), actor, board_id).await;
            pending(tx, result)
        })
        .await
    }

    pub async fn update_column(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
        changes: &ColumnChanges,
    ) -> Result<Column, StorageError> {
        let actor = require_actor(actor)?;
        let name = changes
            .name
            .as_deref()
            .map(|name| required("name", name))
            .transpose()?;
        let position = changes.position.map(non_negative).transpose()?;
        let column = self
            .deadline("update_column", async {
                let mut tx = self.store.begin().await?;
                let result =
                    columns::update(tx.as_mut(), actor, board_id, column_id, name, position).await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.columns.update",
            "Updated column {} (position {})",
            column.id,
            column.position
        );
        Ok(column)
    }

    pub async fn delete_column(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
    ) -> Result<(), StorageError> {
        let actor = require_actor(actor)?;
        let column = self
            .deadline("delete_column", async {
                let mut tx = self.store.begin().await?;
                let result = columns::delete(tx.as_mut(), actor, board_id, column_id).await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.columns.delete",
            "Deleted column {} from position {} of board {}",
            column.id,
            column.position,
            column.board_id
        );
        Ok(())
    }

    // -- Tasks --

    pub async fn create_task(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
        new_task: &NewTask,
    ) -> Result<Task, StorageError> {
        let actor = require_actor(actor)?;
        let title = required("title", &new_task.title)?;
        let description = new_task.description.trim();
        let task = self
            .deadline("create_task", async {
                let mut tx = self.store.begin().await?;
                let result =
                    tasks::create(tx.as_mut(), actor, board_id, column_id, title, description)
                        .await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.tasks.create",
            "Created task {} in column {} at position {}",
            task.id,
            task.column_id,
            task.position
        );
        Ok(task)
    }

    pub async fn list_column_tasks(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
    ) -> Result<Vec<Task>, StorageError> {
        let actor = require_actor(actor)?;
        self.deadline("list_column_tasks", async {
            let mut tx = self.store.begin().await?;
            let result = tasks::list_in_column(tx.as_mut(), actor, board_id, column_id).await;
            pending(tx, result)
        })
        .await
    }

    pub async fn list_board_tasks(
        &self,
        actor: &str,
        board_id: &str,
    ) -> Result<Vec<Task>, StorageError> {
        let actor = require_actor(actor)?;
        self.deadline("list_board_tasks", async {
            let mut tx = self.store.begin().await?;
            let result = tasks::list_on_board(tx.as_mut(), actor, board_id).await;
            pending(tx, result)
        })
        .await
    }

    pub async fn update_task(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
        task_id: &str,
        changes: &TaskChanges,
    ) -> Result<Task, StorageError> {
        let actor = require_actor(actor)?;
        let edit = Edit {
            title: changes
                .title
                .as_deref()
                .map(|title| required("title", title))
                .transpose()?,
            description: changes.description.as_deref().map(str::trim),
            position: changes.position.map(non_negative).transpose()?,
        };
        let task = self
            .deadline("update_task", async {
                let mut tx = self.store.begin().await?;
                let result =
                    tasks::update(tx.as_mut(), actor, board_id, column_id, task_id, edit).await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.tasks.update",
            "Updated task {} (position {})",
            task.id,
            task.position
        );
        Ok(task)
    }

    pub async fn delete_task(
        &self,
        actor: &str,
        board_id: &str,
        column_id: &str,
        task_id: &str,
    ) -> Result<(), StorageError> {
        let actor = require_actor(actor)?;
        let task = self
            .deadline("delete_task", async {
                let mut tx = self.store.begin().await?;
                let result = tasks::delete(tx.as_mut(), actor, board_id, column_id, task_id).await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.tasks.delete",
            "Deleted task {} from position {} of column {}",
            task.id,
            task.position,
            task.column_id
        );
        Ok(())
    }

    /// Move a task to the end of another column on the same board.
    pub async fn move_task(
        &self,
        actor: &str,
        board_id: &str,
        task_id: &str,
        destination_column_id: &str,
    ) -> Result<Task, StorageError> {
        let actor = require_actor(actor)?;
        let outcome: MoveOutcome = self
            .deadline("move_task", async {
                let mut tx = self.store.begin().await?;
                let result =
                    moves::move_task(tx.as_mut(), actor, board_id, task_id, destination_column_id)
                        .await;
                pending(tx, result)
            })
            .await?;
        log::info!(
            target: "kanban.tasks.move",
            "Moved task {} from {}#{} to {}#{}",
            outcome.task.id,
            outcome.from_column_id,
            outcome.from_position,
            outcome.task.column_id,
            outcome.task.position
        );
        Ok(outcome.task)
    }

    /// Run `begin` and the operation's work under the deadline, then commit or
    /// roll back outside it. A commit that has been sent always runs to
    /// completion; expiry before that drops the transaction unfinished.
    async fn deadline<T, F>(&self, operation: &'static str, work: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<Pending<T>, StorageError>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(pending) => {
                let (tx, result) = pending?;
                finish(tx, result).await
            }
            Err(_) => {
                log::warn!(
                    target: "kanban.service",
                    "{} exceeded its deadline of {:?}",
                    operation,
                    self.timeout
                );
                Err(StorageError::Timeout(self.timeout))
            }
        }
    }
}

/// An open transaction and the outcome of the work done in it.
type Pending<T> = (Box<dyn Transaction>, Result<T, StorageError>);

fn pending<T>(
    tx: Box<dyn Transaction>,
    result: Result<T, StorageError>,
) -> Result<Pending<T>, StorageError> {
    Ok((tx, result))
}

/// Commit on success, roll back on failure. A failed rollback is logged and
/// the operation's own error is still returned.
async fn finish<T>(
    tx: Box<dyn Transaction>,
    result: Result<T, StorageError>,
) -> Result<T, StorageError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!(
                    target: "kanban.service",
                    "Rollback after '{}' failed: {}",
                    err,
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

fn require_actor(actor: &str) -> Result<&str, StorageError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(StorageError::InvalidInput("acting user is required".to_string()));
    }
    Ok(actor)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, StorageError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StorageError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value)
}

fn non_negative(position: i32) -> Result<i32, StorageError> {
    if position < 0 {
        return Err(StorageError::InvalidInput(format!(
            "position must be >= 0, got {}",
            position
        )));
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::is_dense;
    use crate::storage::memory::MemoryStore;
    use crate::storage::ErrorKind;

    fn service() -> (KanbanService, MemoryStore) {
        let store = MemoryStore::new();
        (KanbanService::new(Arc::new(store.clone())), store)
    }

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: String::new(),
        }
    }

    fn names(columns: &[Column]) -> Vec<(&str, i32)> {
        columns.iter().map(|c| (c.name.as_str(), c.position)).collect()
    }

    fn titles(tasks: &[Task]) -> Vec<(&str, i32)> {
        tasks.iter().map(|t| (t.title.as_str(), t.position)).collect()
    }

    #[tokio::test]
    async fn test_create_column_reads_back_at_max_plus_one() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        for (expected, name) in ["Todo", "Doing", "Done"].iter().enumerate() {
            let column = svc.create_column("alice", &board.id, name).await.unwrap();
            let listed = svc.list_columns("alice", &board.id).await.unwrap();
            let found = listed.iter().find(|c| c.id == column.id).unwrap();
            assert_eq!(found.position, expected as i32 + 1);
        }
    }

    #[tokio::test]
    async fn test_delete_middle_column_compacts_board() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        svc.create_column("alice", &board.id, "Todo").await.unwrap();
        let doing = svc.create_column("alice", &board.id, "Doing").await.unwrap();
        svc.create_column("alice", &board.id, "Done").await.unwrap();

        svc.delete_column("alice", &board.id, &doing.id).await.unwrap();

        let columns = svc.list_columns("alice", &board.id).await.unwrap();
        assert_eq!(names(&columns), vec![("Todo", 1), ("Done", 2)]);
    }

    #[tokio::test]
    async fn test_move_task_between_columns() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let doing = svc.create_column("alice", &board.id, "Doing").await.unwrap();
        let done = svc.create_column("alice", &board.id, "Done").await.unwrap();
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let task = svc
                .create_task("alice", &board.id, &doing.id, &new_task(title))
                .await
                .unwrap();
            ids.push(task.id);
        }

        let moved = svc.move_task("alice", &board.id, &ids[1], &done.id).await.unwrap();
        assert_eq!(moved.column_id, done.id);
        assert_eq!(moved.position, 1);

        let doing_tasks = svc.list_column_tasks("alice", &board.id, &doing.id).await.unwrap();
        let done_tasks = svc.list_column_tasks("alice", &board.id, &done.id).await.unwrap();
        assert_eq!(titles(&doing_tasks), vec![("A", 1), ("C", 2)]);
        assert_eq!(titles(&done_tasks), vec![("B", 1)]);
    }

    #[tokio::test]
    async fn test_failed_move_leaves_positions_unchanged() {
        let (svc, store) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let doing = svc.create_column("alice", &board.id, "Doing").await.unwrap();
        let done = svc.create_column("alice", &board.id, "Done").await.unwrap();
        let first = svc
            .create_task("alice", &board.id, &doing.id, &new_task("A"))
            .await
            .unwrap();
        svc.create_task("alice", &board.id, &doing.id, &new_task("B"))
            .await
            .unwrap();
        svc.create_task("alice", &board.id, &done.id, &new_task("X"))
            .await
            .unwrap();

        // The gap in the source is already closed when the final write fails.
        store.fail_next("update_task");
        let err = svc
            .move_task("alice", &board.id, &first.id, &done.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);

        let doing_tasks = svc.list_column_tasks("alice", &board.id, &doing.id).await.unwrap();
        let done_tasks = svc.list_column_tasks("alice", &board.id, &done.id).await.unwrap();
        assert_eq!(titles(&doing_tasks), vec![("A", 1), ("B", 2)]);
        assert_eq!(titles(&done_tasks), vec![("X", 1)]);
    }

    #[tokio::test]
    async fn test_cross_board_move_changes_nothing() {
        let (svc, _) = service();
        let work = svc.create_board("alice", "Work").await.unwrap();
        let home = svc.create_board("alice", "Home").await.unwrap();
        let todo = svc.create_column("alice", &work.id, "Todo").await.unwrap();
        let inbox = svc.create_column("alice", &home.id, "Inbox").await.unwrap();
        let task = svc
            .create_task("alice", &work.id, &todo.id, &new_task("A"))
            .await
            .unwrap();

        let err = svc
            .move_task("alice", &work.id, &task.id, &inbox.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let work_tasks = svc.list_board_tasks("alice", &work.id).await.unwrap();
        let home_tasks = svc.list_board_tasks("alice", &home.id).await.unwrap();
        assert_eq!(titles(&work_tasks), vec![("A", 1)]);
        assert!(home_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_update_task_past_end_lands_last() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let todo = svc.create_column("alice", &board.id, "Todo").await.unwrap();
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let task = svc
                .create_task("alice", &board.id, &todo.id, &new_task(title))
                .await
                .unwrap();
            ids.push(task.id);
        }

        let changes = TaskChanges {
            title: None,
            description: None,
            position: Some(99),
        };
        let task = svc
            .update_task("alice", &board.id, &todo.id, &ids[0], &changes)
            .await
            .unwrap();
        assert_eq!(task.position, 3);

        let listed = svc.list_column_tasks("alice", &board.id, &todo.id).await.unwrap();
        assert_eq!(titles(&listed), vec![("B", 1), ("C", 2), ("A", 3)]);

        // A later append still lands right after the last task.
        let appended = svc
            .create_task("alice", &board.id, &todo.id, &new_task("D"))
            .await
            .unwrap();
        assert_eq!(appended.position, 4);
    }

    #[tokio::test]
    async fn test_update_column_past_end_lands_last() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let todo = svc.create_column("alice", &board.id, "Todo").await.unwrap();
        svc.create_column("alice", &board.id, "Doing").await.unwrap();
        svc.create_column("alice", &board.id, "Done").await.unwrap();

        let changes = ColumnChanges {
            name: None,
            position: Some(50),
        };
        let column = svc
            .update_column("alice", &board.id, &todo.id, &changes)
            .await
            .unwrap();
        assert_eq!(column.position, 3);

        let columns = svc.list_columns("alice", &board.id).await.unwrap();
        assert_eq!(names(&columns), vec![("Doing", 1), ("Done", 2), ("Todo", 3)]);
        assert!(is_dense(columns.iter().map(|c| c.position)));
    }

    #[tokio::test]
    async fn test_update_task_reorders_within_column() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let todo = svc.create_column("alice", &board.id, "Todo").await.unwrap();
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let task = svc
                .create_task("alice", &board.id, &todo.id, &new_task(title))
                .await
                .unwrap();
            ids.push(task.id);
        }

        let changes = TaskChanges {
            title: Some("  C2 ".to_string()),
            description: None,
            position: Some(1),
        };
        let task = svc
            .update_task("alice", &board.id, &todo.id, &ids[2], &changes)
            .await
            .unwrap();
        assert_eq!(task.title, "C2");
        assert_eq!(task.position, 1);

        let listed = svc.list_column_tasks("alice", &board.id, &todo.id).await.unwrap();
        assert_eq!(titles(&listed), vec![("C2", 1), ("A", 2), ("B", 3)]);
    }

    #[tokio::test]
    async fn test_update_column_position_zero_keeps_slot() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        svc.create_column("alice", &board.id, "Todo").await.unwrap();
        let doing = svc.create_column("alice", &board.id, "Doing").await.unwrap();

        let changes = ColumnChanges {
            name: Some("In progress".to_string()),
            position: Some(0),
        };
        let column = svc
            .update_column("alice", &board.id, &doing.id, &changes)
            .await
            .unwrap();
        assert_eq!(column.name, "In progress");
        assert_eq!(column.position, 2);
    }

    #[tokio::test]
    async fn test_delete_task_compacts_column() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let todo = svc.create_column("alice", &board.id, "Todo").await.unwrap();
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let task = svc
                .create_task("alice", &board.id, &todo.id, &new_task(title))
                .await
                .unwrap();
            ids.push(task.id);
        }

        svc.delete_task("alice", &board.id, &todo.id, &ids[0]).await.unwrap();
        let listed = svc.list_column_tasks("alice", &board.id, &todo.id).await.unwrap();
        assert_eq!(titles(&listed), vec![("B", 1), ("C", 2)]);
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_input() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let todo = svc.create_column("alice", &board.id, "Todo").await.unwrap();

        let cases = [
            svc.create_board("alice", "   ").await.map(|_| ()),
            svc.create_board("", "Work").await.map(|_| ()),
            svc.create_task("alice", &board.id, &todo.id, &new_task(""))
                .await
                .map(|_| ()),
            svc.update_column(
                "alice",
                &board.id,
                &todo.id,
                &ColumnChanges {
                    name: None,
                    position: Some(-1),
                },
            )
            .await
            .map(|_| ()),
        ];
        for result in cases {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
        }
    }

    #[tokio::test]
    async fn test_other_users_board_is_not_found() {
        let (svc, _) = service();
        let board = svc.create_board("alice", "Work").await.unwrap();
        let err = svc.get_board("mallory", &board.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "not found");
        assert!(svc.list_boards("mallory").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operation_times_out_while_store_is_busy() {
        let (svc, store) = service();
        let svc = svc.with_timeout(Duration::from_millis(50));

        // An open transaction holds the store-wide lock.
        let held = store.begin().await.unwrap();
        let err = svc.create_board("alice", "Work").await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(err.kind(), ErrorKind::System);
        drop(held);

        assert!(svc.list_boards("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_commit_is_not_cut_off_by_deadline() {
        let (svc, store) = service();
        let svc = svc.with_timeout(Duration::from_millis(50));

        store.delay_next_commit(Duration::from_millis(150));
        let board = svc.create_board("alice", "Work").await.unwrap();

        let boards = svc.list_boards("alice").await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].id, board.id);
    }
}
