//! Worker checkpoint descriptors.

use serde::{Deserialize, Serialize};

use crate::domain::ports::model_runtime::TokenId;

/// Role of a worker, a closed set dispatched by match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Produces code committed to the worker's branch.
    Coding,
    /// Produces reasoning enrichment injected into coding prompts.
    Reasoning,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Reasoning => "reasoning",
        }
    }
}

/// Configuration of one model checkpoint backing a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSpec {
    /// Name or filesystem path of the checkpoint.
    pub name_or_path: String,
    /// Worker role, `coding` or `reasoning`.
    #[serde(rename = "trait")]
    pub role: WorkerRole,
    /// Token sequence opening a reasoning span (reasoning checkpoints only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_start_tokens: Vec<TokenId>,
    /// Token sequence closing a reasoning span (reasoning checkpoints only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_stop_tokens: Vec<TokenId>,
}

impl CheckpointSpec {
    /// Worker identity: the checkpoint basename. Worker branches are named
    /// `<id>_<feature-branch>`.
    pub fn id(&self) -> &str {
        self.name_or_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.name_or_path)
    }
}
