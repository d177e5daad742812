//! Domain data model.

pub mod annotation;
pub mod branch;
pub mod checkpoint;
pub mod config;
pub mod event;
pub mod prompt;
pub mod template;

pub use annotation::{Annotation, SubNote, REVERT_PREFIX};
pub use branch::{BranchKind, NamingScheme, RepositoryRef};
pub use checkpoint::{CheckpointSpec, WorkerRole};
pub use config::{Config, RuntimeConfig};
pub use event::RepoEvent;
pub use prompt::PromptAssembler;
pub use template::TaskTemplate;
