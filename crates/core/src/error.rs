use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    /// Malformed campaign or prospect input, rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// External send or publish failure; the work item stays due.
    #[error("Transient dispatch error: {0}")]
    TransientDispatch(String),

    /// The prospect was not in the state the operation requires.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Cadence exhausted, no enabled destination, or a dangling reference.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Flat error classification carried in batch reports and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    TransientDispatch,
    StateConflict,
    Configuration,
    NotFound,
    Store,
    Internal,
}

impl CampaignError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CampaignError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CampaignError::Validation(_) => ErrorKind::Validation,
            CampaignError::TransientDispatch(_) => ErrorKind::TransientDispatch,
            CampaignError::StateConflict(_) => ErrorKind::StateConflict,
            CampaignError::Configuration(_) => ErrorKind::Configuration,
            CampaignError::NotFound { .. } => ErrorKind::NotFound,
            CampaignError::Store(_) => ErrorKind::Store,
            CampaignError::Serialization(_) | CampaignError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a later cycle may succeed without any operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CampaignError::TransientDispatch(_) | CampaignError::Store(_)
        )
    }
}
