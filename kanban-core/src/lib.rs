//! Kanban Core: board, column and task storage with dense sibling ordering
//! and owner-scoped access.
pub mod boards;
pub mod columns;
pub mod config;
pub mod moves;
pub mod ordering;
pub mod ownership;
pub mod service;
pub mod storage;
pub mod tasks;
pub mod types;

pub use service::KanbanService;
pub use storage::{ErrorKind, StorageError, Store, Transaction};
