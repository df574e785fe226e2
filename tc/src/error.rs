//! Error taxonomy for the core engine
//!
//! Most of these never escape to the user as failures: validation errors
//! become re-prompts, not-found and ambiguity errors list candidates, and
//! external-service errors are absorbed by fallbacks.

use std::time::Duration;

use taskstore::StoreError;
use thiserror::Error;

use crate::conflict::ConflictResult;
use crate::nlu::NluError;
use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No task matches '{reference}'")]
    NotFound { reference: String, candidates: Vec<String> },

    #[error("'{reference}' matches several tasks: {}", candidates.join(", "))]
    Ambiguous { reference: String, candidates: Vec<String> },

    #[error("Schedule conflict with {} existing entries", result.conflicts.len())]
    Conflict { result: ConflictResult },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ServiceError> for CoreError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Timeout(d) => CoreError::Timeout(d),
            other => CoreError::ExternalService(other.to_string()),
        }
    }
}

impl From<NluError> for CoreError {
    fn from(err: NluError) -> Self {
        match err {
            NluError::Timeout(d) => CoreError::Timeout(d),
            other => CoreError::ExternalService(other.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
