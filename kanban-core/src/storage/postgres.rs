/// PostgreSQL storage backend.
///
/// Every `Transaction` wraps one `sqlx` transaction on a pooled connection.
/// Lock modes become `FOR SHARE` / `FOR UPDATE` on the row read, so the
/// locks live exactly as long as the transaction. Identifiers are UUIDs in
/// the database and strings everywhere else; a string that does not parse as
/// a UUID cannot name a row and resolves to "not found".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use uuid::Uuid;

use super::{LockMode, StorageError, Store, Transaction};
use crate::config::DatabaseConfig;
use crate::types::{Board, Column, Container, Task};

const SCHEMA: &str = include_str!("schema.sql");

const BOARD_COLUMNS: &str = "id, owner_id, name, created_at, updated_at";
const COLUMN_COLUMNS: &str = "id, board_id, name, position, created_at, updated_at";
const TASK_COLUMNS: &str =
    "id, board_id, column_id, title, description, position, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BoardRow {
    id: Uuid,
    owner_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Board {
            id: row.id.to_string(),
            owner_id: row.owner_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ColumnRow {
    id: Uuid,
    board_id: Uuid,
    name: String,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ColumnRow> for Column {
    fn from(row: ColumnRow) -> Self {
        Column {
            id: row.id.to_string(),
            board_id: row.board_id.to_string(),
            name: row.name,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    board_id: Uuid,
    column_id: Uuid,
    title: String,
    description: String,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id.to_string(),
            board_id: row.board_id.to_string(),
            column_id: row.column_id.to_string(),
            title: row.title,
            description: row.description,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn require_id(id: &str) -> Result<Uuid, StorageError> {
    parse_id(id).ok_or(StorageError::NotFound)
}

fn lock_clause(mode: LockMode) -> &'static str {
    match mode {
        LockMode::None => "",
        LockMode::Share => " FOR SHARE",
        LockMode::Exclusive => " FOR UPDATE",
    }
}

/// Table holding the siblings of a container, and the column naming the parent.
fn sibling_table(container: Container<'_>) -> (&'static str, &'static str) {
    match container {
        Container::Board(_) => ("columns", "board_id"),
        Container::Column(_) => ("tasks", "column_id"),
    }
}

/// PostgreSQL-backed store over a connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and apply the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        log::info!(
            target: "kanban.storage.postgres",
            "Connected to PostgreSQL (max {} connections)",
            config.max_connections
        );
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn lock_board(
        &mut self,
        board_id: &str,
        owner_id: &str,
        mode: LockMode,
    ) -> Result<Option<Board>, StorageError> {
        let Some(id) = parse_id(board_id) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM boards WHERE id = $1 AND owner_id = $2{}",
            BOARD_COLUMNS,
            lock_clause(mode)
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Board::from))
    }

    async fn lock_column(
        &mut self,
        column_id: &str,
        board_id: &str,
        mode: LockMode,
    ) -> Result<Option<Column>, StorageError> {
        let (Some(id), Some(board_id)) = (parse_id(column_id), parse_id(board_id)) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM columns WHERE id = $1 AND board_id = $2{}",
            COLUMN_COLUMNS,
            lock_clause(mode)
        );
        let row = sqlx::query_as::<_, ColumnRow>(&sql)
            .bind(id)
            .bind(board_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Column::from))
    }

    async fn lock_task(
        &mut self,
        task_id: &str,
        board_id: &str,
        mode: LockMode,
    ) -> Result<Option<Task>, StorageError> {
        let (Some(id), Some(board_id)) = (parse_id(task_id), parse_id(board_id)) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND board_id = $2{}",
            TASK_COLUMNS,
            lock_clause(mode)
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(board_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Task::from))
    }

    async fn max_position(
        &mut self,
        container: Container<'_>,
        exclude: Option<&str>,
    ) -> Result<i32, StorageError> {
        let parent = require_id(container.id())?;
        let exclude = exclude.and_then(parse_id);
        let (table, parent_column) = sibling_table(container);
        let sql = format!(
            "SELECT COALESCE(MAX(position), 0) FROM {table} \
             WHERE {parent_column} = $1 AND ($2::uuid IS NULL OR id <> $2)"
        );
        let max: i32 = sqlx::query_scalar(&sql)
            .bind(parent)
            .bind(exclude)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(max)
    }

    async fn shift_positions(
        &mut self,
        container: Container<'_>,
        from: i32,
        delta: i32,
        exclude: Option<&str>,
    ) -> Result<u64, StorageError> {
        let parent = require_id(container.id())?;
        let exclude = exclude.and_then(parse_id);
        let (table, parent_column) = sibling_table(container);
        let sql = format!(
            "UPDATE {table} SET position = position + $2 \
             WHERE {parent_column} = $1 AND position >= $3 AND ($4::uuid IS NULL OR id <> $4)"
        );
        let result = sqlx::query(&sql)
            .bind(parent)
            .bind(delta)
            .bind(from)
            .bind(exclude)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_board(&mut self, owner_id: &str, name: &str) -> Result<Board, StorageError> {
        let sql = format!(
            "INSERT INTO boards (owner_id, name) VALUES ($1, $2) RETURNING {}",
            BOARD_COLUMNS
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(owner_id)
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn insert_column(
        &mut self,
        board_id: &str,
        name: &str,
        position: i32,
    ) -> Result<Column, StorageError> {
        let board_id = require_id(board_id)?;
        let sql = format!(
            "INSERT INTO columns (board_id, name, position) VALUES ($1, $2, $3) RETURNING {}",
            COLUMN_COLUMNS
        );
        let row = sqlx::query_as::<_, ColumnRow>(&sql)
            .bind(board_id)
            .bind(name)
            .bind(position)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn insert_task(
        &mut self,
        column: &Column,
        title: &str,
        description: &str,
        position: i32,
    ) -> Result<Task, StorageError> {
        let board_id = require_id(&column.board_id)?;
        let column_id = require_id(&column.id)?;
        let sql = format!(
            "INSERT INTO tasks (board_id, column_id, title, description, position) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TASK_COLUMNS
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(board_id)
            .bind(column_id)
            .bind(title)
            .bind(description)
            .bind(position)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn update_board(&mut self, board: &Board) -> Result<Board, StorageError> {
        let id = require_id(&board.id)?;
        let sql = format!(
            "UPDATE boards SET name = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            BOARD_COLUMNS
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(&board.name)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Board::from).ok_or(StorageError::NotFound)
    }

    async fn update_column(&mut self, column: &Column) -> Result<Column, StorageError> {
        let id = require_id(&column.id)?;
        let sql = format!(
            "UPDATE columns SET name = $1, position = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            COLUMN_COLUMNS
        );
        let row = sqlx::query_as::<_, ColumnRow>(&sql)
            .bind(&column.name)
            .bind(column.position)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Column::from).ok_or(StorageError::NotFound)
    }

    async fn update_task(&mut self, task: &Task) -> Result<Task, StorageError> {
        let id = require_id(&task.id)?;
        let board_id = require_id(&task.board_id)?;
        let column_id = require_id(&task.column_id)?;
        let sql = format!(
            "UPDATE tasks SET column_id = $1, title = $2, description = $3, position = $4, \
             updated_at = NOW() WHERE id = $5 AND board_id = $6 RETURNING {}",
            TASK_COLUMNS
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(column_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.position)
            .bind(id)
            .bind(board_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Task::from).ok_or(StorageError::NotFound)
    }

    async fn delete_board(&mut self, board_id: &str) -> Result<(), StorageError> {
        let id = require_id(board_id)?;
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_column(&mut self, column_id: &str) -> Result<(), StorageError> {
        let id = require_id(column_id)?;
        let result = sqlx::query("DELETE FROM columns WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_task(&mut self, task_id: &str) -> Result<(), StorageError> {
        let id = require_id(task_id)?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_boards(&mut self, owner_id: &str) -> Result<Vec<Board>, StorageError> {
        let sql = format!(
            "SELECT {} FROM boards WHERE owner_id = $1 ORDER BY created_at",
            BOARD_COLUMNS
        );
        let rows = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Board::from).collect())
    }

    async fn list_columns(&mut self, board_id: &str) -> Result<Vec<Column>, StorageError> {
        let board_id = require_id(board_id)?;
        let sql = format!(
            "SELECT {} FROM columns WHERE board_id = $1 ORDER BY position, created_at",
            COLUMN_COLUMNS
        );
        let rows = sqlx::query_as::<_, ColumnRow>(&sql)
            .bind(board_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Column::from).collect())
    }

    async fn list_column_tasks(&mut self, column_id: &str) -> Result<Vec<Task>, StorageError> {
        let column_id = require_id(column_id)?;
        let sql = format!(
            "SELECT {} FROM tasks WHERE column_id = $1 ORDER BY position, created_at",
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(column_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn list_board_tasks(&mut self, board_id: &str) -> Result<Vec<Task>, StorageError> {
        let board_id = require_id(board_id)?;
        let sql = format!(
            "SELECT {} FROM tasks WHERE board_id = $1 ORDER BY position, created_at",
            TASK_COLUMNS
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(board_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
