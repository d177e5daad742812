//! Repository access ports.
//!
//! `RepositoryState` is the read-only surface the differ and task creation
//! depend on; `Repository` adds the mutations the orchestrator performs on
//! behalf of workers. The git adapter in `infrastructure::git` implements
//! both; tests substitute an in-memory double.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::annotation::Annotation;
use crate::domain::models::branch::RepositoryRef;

/// Errors surfaced by repository adapters.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The remote could not be reached. Treated as a no-change observation by
    /// the differ rather than a fault.
    #[error("repository unreachable: {0}")]
    Unreachable(String),

    /// A git command exited nonzero.
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read-only queries over the served repository.
#[async_trait]
pub trait RepositoryState: Send + Sync {
    /// All branches, local and remote-tracking, deduplicated by name.
    async fn list_branches(&self) -> RepositoryResult<Vec<RepositoryRef>>;

    /// All note annotations, most recent first.
    async fn list_annotations(&self) -> RepositoryResult<Vec<Annotation>>;

    /// Branch names whose history contains `commit`, excluding the default
    /// branch.
    async fn branches_containing(&self, commit: &str) -> RepositoryResult<Vec<String>>;

    /// Commit messages on `branch` past the merge base with `feature`,
    /// oldest first.
    async fn branch_messages(&self, feature: &str, branch: &str)
        -> RepositoryResult<Vec<String>>;

    /// Content of `path` on the default branch.
    async fn read_file(&self, path: &str) -> RepositoryResult<String>;

    /// Whether `path` exists on the default branch.
    async fn file_exists(&self, path: &str) -> RepositoryResult<bool>;
}

/// Mutating operations layered over the read-only state.
#[async_trait]
pub trait Repository: RepositoryState {
    /// Create branch `name` at the tip of `from` and push it.
    async fn create_branch(&self, name: &str, from: &str) -> RepositoryResult<()>;

    /// Delete branch `name` locally and on the remote.
    async fn delete_branch(&self, name: &str) -> RepositoryResult<()>;

    /// Write `content` to `path` on `branch` and commit it with `message`,
    /// authored as `author`.
    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
        author: &str,
    ) -> RepositoryResult<()>;
}
