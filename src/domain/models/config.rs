//! Typed configuration for the SymErgion process.
//!
//! All fields are resolved and validated once at load time by
//! `infrastructure::config::ConfigLoader`; nothing reads configuration
//! dynamically afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointSpec;
use super::template::TaskTemplate;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CPU cores kept away from the model runtime's thread pool.
    pub idle_cores: usize,
    /// Capacity of the process-wide model handle cache. Zero disables model
    /// caching.
    pub model_cache_size: usize,
    /// Capacity of each worker's prompt-keyed response cache. Zero disables
    /// response caching.
    pub response_cache_size: usize,
    /// Baseline generation budget for short prompts.
    pub ntokens: usize,
    /// Default branch of the served repository.
    pub default_branch: String,
    /// Pattern addressing a sub-note to a task branch; the first capture
    /// group names the branch.
    pub task_branch_spec: String,
    /// Seconds between reconciliation ticks.
    pub poll_interval_secs: u64,
    /// Model checkpoints to register as workers, in registration order.
    pub checkpoints: Vec<CheckpointSpec>,
    /// Task templates keyed by branch-name prefix.
    pub templates: BTreeMap<String, TaskTemplate>,
    /// Model runtime subprocess settings.
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_cores: 1,
            model_cache_size: 1,
            response_cache_size: 10,
            ntokens: 512,
            default_branch: "main".to_string(),
            task_branch_spec: r"task_branch:\s*([\w.-]+)".to_string(),
            poll_interval_secs: 15,
            checkpoints: Vec::new(),
            templates: BTreeMap::new(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Settings for the model runtime collaborator subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Executable implementing the runtime protocol.
    pub command: String,
    /// Fixed arguments passed before the request.
    pub args: Vec<String>,
    /// Per-call timeout; generation can legitimately take minutes.
    pub timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: "symergion-runtime".to_string(),
            args: Vec::new(),
            timeout_secs: 600,
        }
    }
}
