// Shared handles for request handlers.

use std::sync::Arc;

use copilot_core::db::Database;
use copilot_llm::ChatGateway;

/// Everything a request needs: the store and the LLM gateway. Shared across
/// connection tasks behind an `Arc`.
pub struct AppState {
    pub db: Database,
    pub gateway: Arc<dyn ChatGateway>,
}

impl AppState {
    pub fn new(db: Database, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { db, gateway }
    }
}
