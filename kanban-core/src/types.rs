use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A board owned by exactly one user. Boards are never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column on a board. `position` is 1-based and dense within the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task inside a column. `board_id` is denormalized from the column and
/// always matches it; `position` is 1-based and dense within the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub column_id: String,
    pub title: String,
    pub description: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The scope a sibling ordering lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container<'a> {
    /// Columns of a board.
    Board(&'a str),
    /// Tasks of a column.
    Column(&'a str),
}

impl Container<'_> {
    pub fn id(&self) -> &str {
        match self {
            Container::Board(id) | Container::Column(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Container::Board(_) => "board",
            Container::Column(_) => "column",
        }
    }
}

/// Partial update of a column. A `position` of `None` or `Some(0)` leaves
/// the column where it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
}

/// Partial update of a task. Moving between columns goes through
/// `KanbanService::move_task`, never through an update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
}

/// Fields of a task to create.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}
