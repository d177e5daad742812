//! Domain errors for the SymErgion reconciliation core.

use thiserror::Error;

use crate::domain::ports::model_runtime::RuntimeError;
use crate::domain::ports::repository::RepositoryError;

/// Domain-level errors that can occur while reconciling repository state
/// with the live set of tasks and workers.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found for feature branch: {0}")]
    TaskNotFound(String),

    #[error("No supported task type ({supported}) for branch `{branch}`")]
    UnknownTemplate { branch: String, supported: String },

    #[error("Template `{template}` requires parameter `{param}`, not found in annotation")]
    MissingParameter { template: String, param: String },

    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<regex::Error> for DomainError {
    fn from(err: regex::Error) -> Self {
        DomainError::InvalidPattern {
            pattern: String::new(),
            reason: err.to_string(),
        }
    }
}
