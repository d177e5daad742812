//! Infrastructure adapters implementing the domain ports.

pub mod config;
pub mod git;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader};
pub use git::GitRepository;
pub use runtime::ProcessRuntime;
