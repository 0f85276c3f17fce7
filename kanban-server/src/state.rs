/// Shared application state passed to axum handlers.
use kanban_core::KanbanService;

#[derive(Clone)]
pub struct AppState {
    pub service: KanbanService,
}

impl AppState {
    pub fn new(service: KanbanService) -> Self {
        Self { service }
    }
}
