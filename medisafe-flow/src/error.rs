use thiserror::Error;

use crate::comparison::MAX_COMPARISON_ITEMS;

/// Errors surfaced by workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Please enter a question about drug interactions")]
    Validation,

    #[error("A query is already being analyzed")]
    SubmissionInFlight,

    #[error("Analysis service unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Analysis service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Maximum {} queries can be compared", MAX_COMPARISON_ITEMS)]
    ComparisonFull,

    #[error("Query {0} already added to comparison")]
    Duplicate(String),

    #[error("No result to export")]
    NoResult,

    #[error("Report export failed: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// True for failures of the outbound call (transport, timeout or non-2xx).
    pub fn is_network(&self) -> bool {
        matches!(self, WorkflowError::Network(_) | WorkflowError::Service { .. })
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
