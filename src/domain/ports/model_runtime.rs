//! Model runtime port.
//!
//! Loading, tokenization, and generation live behind one async trait so the
//! orchestration layer never touches the inference substrate directly. The
//! process adapter in `infrastructure::runtime` implements it; tests use a
//! scripted double.

use async_trait::async_trait;
use thiserror::Error;

/// Vocabulary token identifier.
pub type TokenId = u32;

/// A loaded model checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    /// Checkpoint name or path the handle was loaded from.
    pub checkpoint: String,
    /// Context window size in tokens.
    pub max_position_embeddings: usize,
}

/// Errors surfaced by model runtime adapters.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to load checkpoint {checkpoint}: {reason}")]
    LoadFailed { checkpoint: String, reason: String },

    #[error("generation failed on {checkpoint}: {reason}")]
    GenerationFailed { checkpoint: String, reason: String },

    #[error("tokenizer failed on {checkpoint}: {reason}")]
    TokenizerFailed { checkpoint: String, reason: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Inference substrate operations.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Load a checkpoint and report its context window.
    async fn load(&self, checkpoint: &str) -> RuntimeResult<ModelHandle>;

    /// Tokenize `text` with the handle's tokenizer.
    async fn encode(&self, handle: &ModelHandle, text: &str) -> RuntimeResult<Vec<TokenId>>;

    /// Detokenize `tokens`, skipping special tokens.
    async fn decode(&self, handle: &ModelHandle, tokens: &[TokenId]) -> RuntimeResult<String>;

    /// Generate up to `max_new_tokens` continuation tokens for `prompt`.
    /// Returns only the newly generated tokens.
    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        max_new_tokens: usize,
    ) -> RuntimeResult<Vec<TokenId>>;
}
