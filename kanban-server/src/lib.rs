//! Kanban Server: config loading, storage init and the HTTP API.
pub mod api;
pub mod config;
pub mod logging;
pub mod server;
pub mod state;

use std::sync::Arc;

use kanban_core::storage::memory::MemoryStore;
use kanban_core::storage::postgres::PgStore;
use kanban_core::{KanbanService, StorageError, Store};
use thiserror::Error;

use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
    #[error("HTTP server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// PostgreSQL when a database is configured, in-memory storage otherwise.
pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn Store>, StorageError> {
    match &config.database {
        Some(database) => Ok(Arc::new(PgStore::connect(database).await?)),
        None => {
            log::warn!(
                target: "kanban.server",
                "No database configured, boards are kept in memory and lost on exit"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let store = open_store(&config).await?;
    let service = KanbanService::new(store).with_timeout(config.operation_timeout());
    let state = AppState::new(service);
    server::serve(&config.bind_address, config.port, state).await?;
    Ok(())
}
