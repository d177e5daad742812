//! SymErgion: a git-mediated orchestrator for small LLM workers.
//!
//! The served repository is the only coordination medium. Feature branches
//! declare tasks, note annotations carry instructions and feedback, and each
//! worker commits its responses to a branch of its own. The process polls the
//! repository, diffs it against the last snapshot, and reconciles the typed
//! change events into task state and generation rounds.
//!
//! # Architecture
//!
//! - `domain` holds the data model and the port traits for repository access
//!   and the model runtime.
//! - `services` implements the differ, the workers with their caches, task
//!   lifecycle, and the orchestrator.
//! - `infrastructure` adapts the ports to the `git` CLI and a runtime
//!   subprocess, and loads configuration.
//! - `cli` defines the command line surface.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Annotation, Config, NamingScheme, PromptAssembler, RepoEvent};
pub use domain::ports::{ModelRuntime, Repository, RepositoryState};
pub use services::{StateDiffer, TaskOrchestrator, Worker};
