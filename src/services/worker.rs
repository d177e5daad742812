//! Generation workers.
//!
//! A worker wraps one model checkpoint together with its response cache and a
//! reference to the shared model cache. Coding workers return decoded output
//! verbatim; reasoning workers extract the span between their configured
//! start and stop token markers and strip fenced code blocks from it.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::checkpoint::{CheckpointSpec, WorkerRole};
use crate::domain::ports::model_runtime::{ModelRuntime, TokenId};
use crate::services::cache::{CachedResponse, ModelCache, ResponseCache};

/// Output of one generation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub text: String,
    pub tokens: Vec<TokenId>,
    /// True when the response came from the cache without touching the
    /// runtime.
    pub cached: bool,
}

/// One checkpoint-backed generation worker.
pub struct Worker {
    checkpoint: CheckpointSpec,
    ntokens: usize,
    runtime: Arc<dyn ModelRuntime>,
    models: Arc<ModelCache>,
    responses: ResponseCache,
}

impl Worker {
    pub fn new(
        checkpoint: CheckpointSpec,
        ntokens: usize,
        response_cache_size: usize,
        runtime: Arc<dyn ModelRuntime>,
        models: Arc<ModelCache>,
    ) -> Self {
        Self {
            checkpoint,
            ntokens,
            runtime,
            models,
            responses: ResponseCache::new(response_cache_size),
        }
    }

    /// Worker identity, the checkpoint basename.
    pub fn id(&self) -> &str {
        self.checkpoint.id()
    }

    pub fn role(&self) -> WorkerRole {
        self.checkpoint.role
    }

    /// Generate a response for the rendered prompt.
    ///
    /// An identical prompt seen before is answered from the response cache
    /// without loading or invoking the model. A prompt that already fills the
    /// context window yields an empty output, which is cached like any other.
    pub async fn generate(&mut self, prompt: &str) -> DomainResult<GeneratedOutput> {
        if let Some(hit) = self.responses.get(prompt) {
            return Ok(GeneratedOutput {
                text: hit.text.clone(),
                tokens: hit.tokens.clone(),
                cached: true,
            });
        }

        let handle = self
            .models
            .get_or_load(self.runtime.as_ref(), &self.checkpoint.name_or_path)
            .await?;
        let encoded = self.runtime.encode(&handle, prompt).await?;
        let budget = max_new_tokens(encoded.len(), handle.max_position_embeddings, self.ntokens);

        let (text, tokens) = if budget == 0 {
            (String::new(), Vec::new())
        } else {
            let tokens = self.runtime.generate(&handle, prompt, budget).await?;
            let text = match self.checkpoint.role {
                WorkerRole::Coding => self.runtime.decode(&handle, &tokens).await?,
                WorkerRole::Reasoning => {
                    let span = reasoning_span(
                        &tokens,
                        &self.checkpoint.reasoning_start_tokens,
                        &self.checkpoint.reasoning_stop_tokens,
                    );
                    match span {
                        Some(span) if !span.is_empty() => {
                            strip_code_fences(&self.runtime.decode(&handle, span).await?)
                        }
                        _ => String::new(),
                    }
                }
            };
            (text, tokens)
        };

        self.responses.put(
            prompt.to_string(),
            CachedResponse {
                text: text.clone(),
                tokens: tokens.clone(),
            },
        );
        Ok(GeneratedOutput {
            text,
            tokens,
            cached: false,
        })
    }
}

/// Length-adaptive generation budget.
///
/// Short prompts get close to the `ntokens` baseline; as the prompt grows the
/// budget rises smoothly toward the context window, and it is always clamped
/// to the tokens actually left in the window.
pub fn max_new_tokens(
    encoded_len: usize,
    max_position_embeddings: usize,
    ntokens: usize,
) -> usize {
    let remaining = max_position_embeddings.saturating_sub(encoded_len);
    if remaining == 0 {
        return 0;
    }
    if max_position_embeddings <= ntokens {
        return remaining;
    }
    let headroom = (max_position_embeddings - ntokens) as f64;
    let budget = (max_position_embeddings as f64
        - headroom * (-(encoded_len as f64) / headroom).exp())
    .round() as usize;
    budget.min(remaining)
}

/// Tokens strictly between the first start marker and the first stop marker
/// after it. `None` when either marker is absent.
fn reasoning_span<'a>(
    tokens: &'a [TokenId],
    start: &[TokenId],
    stop: &[TokenId],
) -> Option<&'a [TokenId]> {
    let span_start = find_subsequence(tokens, start)? + start.len();
    let span_len = find_subsequence(&tokens[span_start..], stop)?;
    Some(&tokens[span_start..span_start + span_len])
}

fn find_subsequence(haystack: &[TokenId], needle: &[TokenId]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Drop fenced code blocks from decoded reasoning so only prose reaches the
/// coding prompts.
fn strip_code_fences(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)\s*```\w+\n.*?```\n?").unwrap());
    fence.replace_all(text, "").into_owned()
}
