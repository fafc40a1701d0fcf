// Caller-facing error taxonomy.

use copilot_core::review::HistoryError;
use copilot_llm::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopilotError {
    /// Missing or inconsistent caller input. Rejected before any LLM call.
    #[error("{0}")]
    Validation(String),

    #[error("caller identity missing")]
    Unauthorized,

    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// A turn was submitted against a review that already has its report.
    #[error("review session {id} is already complete")]
    SessionClosed { id: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl CopilotError {
    /// Stable category name sent in error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            CopilotError::Validation(_) => "validation",
            CopilotError::Unauthorized => "unauthorized",
            CopilotError::NotFound { .. } => "not_found",
            CopilotError::SessionClosed { .. } => "session_closed",
            CopilotError::Gateway(e) => e.kind(),
            CopilotError::Storage(_) => "storage",
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CopilotError::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<HistoryError> for CopilotError {
    fn from(err: HistoryError) -> Self {
        CopilotError::Validation(err.to_string())
    }
}
