//! Port traits decoupling the domain from infrastructure.

pub mod model_runtime;
pub mod repository;

pub use model_runtime::{ModelHandle, ModelRuntime, RuntimeError, TokenId};
pub use repository::{Repository, RepositoryError, RepositoryState};
