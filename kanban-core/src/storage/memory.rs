/// Process-local storage backend.
///
/// Holds boards, columns and tasks in ordered maps behind one async mutex.
/// A transaction owns the mutex for its whole lifetime and works on a copy
/// of the state:
/// - commit publishes the copy
/// - rollback (or drop) discards it
///
/// The store-wide mutex serializes all transactions, which is strictly
/// stronger than the row locks the PostgreSQL backend takes, so lock modes
/// are accepted and ignored here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{LockMode, StorageError, Store, Transaction};
use crate::types::{Board, Column, Container, Task};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    boards: BTreeMap<String, Board>,
    columns: BTreeMap<String, Column>,
    tasks: BTreeMap<String, Task>,
}

/// In-memory board storage, used when no database is configured and by tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    /// Primitive name that fails once on its next call.
    injected: Arc<Mutex<Option<&'static str>>>,
    /// Delay applied once, by the next commit, before it publishes.
    commit_delay: Arc<Mutex<Option<Duration>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to the named transaction primitive (e.g.
    /// `"update_task"`) fail with `StorageError::Injected`. One-shot.
    pub fn fail_next(&self, primitive: &'static str) {
        let mut injected = self.injected.lock().unwrap_or_else(|e| e.into_inner());
        *injected = Some(primitive);
    }

    /// Make the next commit wait `delay` before publishing, simulating a
    /// slow database round trip. One-shot.
    pub fn delay_next_commit(&self, delay: Duration) {
        let mut commit_delay = self.commit_delay.lock().unwrap_or_else(|e| e.into_inner());
        *commit_delay = Some(delay);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            injected: self.injected.clone(),
            commit_delay: self.commit_delay.clone(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    injected: Arc<Mutex<Option<&'static str>>>,
    commit_delay: Arc<Mutex<Option<Duration>>>,
}

impl MemoryTransaction {
    fn check(&self, primitive: &'static str) -> Result<(), StorageError> {
        let mut injected = self.injected.lock().unwrap_or_else(|e| e.into_inner());
        if *injected == Some(primitive) {
            *injected = None;
            return Err(StorageError::Injected(primitive));
        }
        Ok(())
    }

    fn siblings<'a>(
        &'a self,
        container: Container<'a>,
        exclude: Option<&'a str>,
    ) -> Box<dyn Iterator<Item = i32> + Send + 'a> {
        match container {
            Container::Board(board_id) => Box::new(
                self.working
                    .columns
                    .values()
                    .filter(move |c| c.board_id == board_id && Some(c.id.as_str()) != exclude)
                    .map(|c| c.position),
            ),
            Container::Column(column_id) => Box::new(
                self.working
                    .tasks
                    .values()
                    .filter(move |t| t.column_id == column_id && Some(t.id.as_str()) != exclude)
                    .map(|t| t.position),
            ),
        }
    }

    fn siblings_mut<'a>(
        &'a mut self,
        container: Container<'a>,
        exclude: Option<&'a str>,
    ) -> Box<dyn Iterator<Item = &'a mut i32> + Send + 'a> {
        match container {
            Container::Board(board_id) => Box::new(
                self.working
                    .columns
                    .values_mut()
                    .filter(move |c| c.board_id == board_id && Some(c.id.as_str()) != exclude)
                    .map(|c| &mut c.position),
            ),
            Container::Column(column_id) => Box::new(
                self.working
                    .tasks
                    .values_mut()
                    .filter(move |t| t.column_id == column_id && Some(t.id.as_str()) != exclude)
                    .map(|t| &mut t.position),
            ),
        }
    }

    fn sorted_tasks<F>(&self, keep: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut tasks: Vec<Task> = self.working.tasks.values().filter(|t| keep(t)).cloned().collect();
        tasks.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        tasks
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn lock_board(
        &mut self,
        board_id: &str,
        owner_id: &str,
        _mode: LockMode,
    ) -> Result<Option<Board>, StorageError> {
        self.check("lock_board")?;
        Ok(self
            .working
            .boards
            .get(board_id)
            .filter(|b| b.owner_id == owner_id)
            .cloned())
    }

    async fn lock_column(
        &mut self,
        column_id: &str,
        board_id: &str,
        _mode: LockMode,
    ) -> Result<Option<Column>, StorageError> {
        self.check("lock_column")?;
        Ok(self
            .working
            .columns
            .get(column_id)
            .filter(|c| c.board_id == board_id)
            .cloned())
    }

    async fn lock_task(
        &mut self,
        task_id: &str,
        board_id: &str,
        _mode: LockMode,
    ) -> Result<Option<Task>, StorageError> {
        self.check("lock_task")?;
        Ok(self
            .working
            .tasks
            .get(task_id)
            .filter(|t| t.board_id == board_id)
            .cloned())
    }

    async fn max_position(
        &mut self,
        container: Container<'_>,
        exclude: Option<&str>,
    ) -> Result<i32, StorageError> {
        self.check("max_position")?;
        let max = self
            .siblings(container, exclude)
            .max()
            .unwrap_or(0);
        Ok(max)
    }

    async fn shift_positions(
        &mut self,
        container: Container<'_>,
        from: i32,
        delta: i32,
        exclude: Option<&str>,
    ) -> Result<u64, StorageError> {
        self.check("shift_positions")?;
        let mut shifted = 0;
        for position in self.siblings_mut(container, exclude) {
            if *position >= from {
                *position += delta;
                shifted += 1;
            }
        }
        Ok(shifted)
    }

    async fn insert_board(&mut self, owner_id: &str, name: &str) -> Result<Board, StorageError> {
        self.check("insert_board")?;
        let now = Utc::now();
        let board = Board {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.working.boards.insert(board.id.clone(), board.clone());
        Ok(board)
    }

    async fn insert_column(
        &mut self,
        board_id: &str,
        name: &str,
        position: i32,
    ) -> Result<Column, StorageError> {
        self.check("insert_column")?;
        if !self.working.boards.contains_key(board_id) {
            return Err(StorageError::NotFound);
        }
        let now = Utc::now();
        let column = Column {
            id: new_id(),
            board_id: board_id.to_string(),
            name: name.to_string(),
            position,
            created_at: now,
            updated_at: now,
        };
        self.working.columns.insert(column.id.clone(), column.clone());
        Ok(column)
    }

    async fn insert_task(
        &mut self,
        column: &Column,
        title: &str,
        description: &str,
        position: i32,
    ) -> Result<Task, StorageError> {
        self.check("insert_task")?;
        if !self.working.columns.contains_key(&column.id) {
            return Err(StorageError::NotFound);
        }
        let now = Utc::now();
        let task = Task {
            id: new_id(),
            board_id: column.board_id.clone(),
            column_id: column.id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            position,
            created_at: now,
            updated_at: now,
        };
        self.working.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_board(&mut self, board: &Board) -> Result<Board, StorageError> {
        self.check("update_board")?;
        let stored = self
            .working
            .boards
            .get_mut(&board.id)
            .ok_or(StorageError::NotFound)?;
        stored.name = board.name.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn update_column(&mut self, column: &Column) -> Result<Column, StorageError> {
        self.check("update_column")?;
        let stored = self
            .working
            .columns
            .get_mut(&column.id)
            .ok_or(StorageError::NotFound)?;
        stored.name = column.name.clone();
        stored.position = column.position;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn update_task(&mut self, task: &Task) -> Result<Task, StorageError> {
        self.check("update_task")?;
        let stored = self
            .working
            .tasks
            .get_mut(&task.id)
            .filter(|t| t.board_id == task.board_id)
            .ok_or(StorageError::NotFound)?;
        stored.column_id = task.column_id.clone();
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.position = task.position;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_board(&mut self, board_id: &str) -> Result<(), StorageError> {
        self.check("delete_board")?;
        if self.working.boards.remove(board_id).is_none() {
            return Err(StorageError::NotFound);
        }
        self.working.columns.retain(|_, c| c.board_id != board_id);
        self.working.tasks.retain(|_, t| t.board_id != board_id);
        Ok(())
    }

    async fn delete_column(&mut self, column_id: &str) -> Result<(), StorageError> {
        self.check("delete_column")?;
        if self.working.columns.remove(column_id).is_none() {
            return Err(StorageError::NotFound);
        }
        self.working.tasks.retain(|_, t| t.column_id != column_id);
        Ok(())
    }

    async fn delete_task(&mut self, task_id: &str) -> Result<(), StorageError> {
        self.check("delete_task")?;
        self.working
            .tasks
            .remove(task_id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn list_boards(&mut self, owner_id: &str) -> Result<Vec<Board>, StorageError> {
        self.check("list_boards")?;
        let mut boards: Vec<Board> = self
            .working
            .boards
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(boards)
    }

    async fn list_columns(&mut self, board_id: &str) -> Result<Vec<Column>, StorageError> {
        self.check("list_columns")?;
        let mut columns: Vec<Column> = self
            .working
            .columns
            .values()
            .filter(|c| c.board_id == board_id)
            .cloned()
            .collect();
        columns.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(columns)
    }

    async fn list_column_tasks(&mut self, column_id: &str) -> Result<Vec<Task>, StorageError> {
        self.check("list_column_tasks")?;
        Ok(self.sorted_tasks(|t| t.column_id == column_id))
    }

    async fn list_board_tasks(&mut self, board_id: &str) -> Result<Vec<Task>, StorageError> {
        self.check("list_board_tasks")?;
        Ok(self.sorted_tasks(|t| t.board_id == board_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.check("commit")?;
        let delay = self
            .commit_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, Board, Column) {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let board = tx.insert_board("alice", "Work").await.unwrap();
        let column = tx.insert_column(&board.id, "Todo", 1).await.unwrap();
        tx.commit().await.unwrap();
        (store, board, column)
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let (store, board, _) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let columns = tx.list_columns(&board.id).await.unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "Todo");
    }

    #[tokio::test]
    async fn test_drop_discards_changes() {
        let (store, board, _) = seeded().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_column(&board.id, "Doing", 2).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.list_columns(&board.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lock_board_checks_owner() {
        let (store, board, _) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx
            .lock_board(&board.id, "alice", LockMode::Share)
            .await
            .unwrap()
            .is_some());
        assert!(tx
            .lock_board(&board.id, "mallory", LockMode::Share)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_shift_positions_respects_exclude() {
        let (store, board, column) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let a = tx.insert_task(&column, "A", "", 1).await.unwrap();
        tx.insert_task(&column, "B", "", 2).await.unwrap();
        tx.insert_task(&column, "C", "", 3).await.unwrap();

        let shifted = tx
            .shift_positions(Container::Column(&column.id), 1, 1, Some(&a.id))
            .await
            .unwrap();
        assert_eq!(shifted, 2);

        let positions: Vec<(String, i32)> = tx
            .list_board_tasks(&board.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.title, t.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("A".to_string(), 1),
                ("B".to_string(), 3),
                ("C".to_string(), 4)
            ]
        );
        assert_eq!(
            tx.max_position(Container::Column(&column.id), None).await.unwrap(),
            4
        );
        assert_eq!(
            tx.max_position(Container::Column("missing"), None).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_column_cascades_tasks() {
        let (store, board, column) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_task(&column, "A", "", 1).await.unwrap();
        tx.delete_column(&column.id).await.unwrap();
        assert!(tx.list_board_tasks(&board.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let (store, board, _) = seeded().await;
        store.fail_next("list_columns");
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.list_columns(&board.id).await,
            Err(StorageError::Injected("list_columns"))
        ));
        assert!(tx.list_columns(&board.id).await.is_ok());
    }
}
