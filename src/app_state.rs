use std::sync::Arc;

use crate::db::WorkflowStore;
use crate::services::dispatch::JdfDispatcher;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    pub dispatcher: Arc<JdfDispatcher>,
}

impl AppState {
    /// The dispatcher already owns the store; the state keeps its own handle
    /// for the queue and health routes.
    pub fn new(dispatcher: JdfDispatcher) -> Self {
        Self {
            store: dispatcher.store().clone(),
            dispatcher: Arc::new(dispatcher),
        }
    }
}
