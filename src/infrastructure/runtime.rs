//! Model runtime adapter.
//!
//! Each operation spawns the configured runtime executable, writes one JSON
//! request to its stdin, and reads one JSON response from its stdout. Keeping
//! the substrate out of process isolates inference crashes and lets the
//! executable be swapped without touching the orchestrator.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::models::config::RuntimeConfig;
use crate::domain::ports::model_runtime::{
    ModelHandle, ModelRuntime, RuntimeError, RuntimeResult, TokenId,
};

/// Subprocess-backed model runtime.
pub struct ProcessRuntime {
    config: RuntimeConfig,
    idle_cores: usize,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Load {
        checkpoint: &'a str,
    },
    Encode {
        checkpoint: &'a str,
        text: &'a str,
    },
    Decode {
        checkpoint: &'a str,
        tokens: &'a [TokenId],
    },
    Generate {
        checkpoint: &'a str,
        prompt: &'a str,
        max_new_tokens: usize,
    },
}

#[derive(Deserialize)]
struct LoadResponse {
    max_position_embeddings: usize,
}

#[derive(Deserialize)]
struct TokensResponse {
    tokens: Vec<TokenId>,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

impl ProcessRuntime {
    pub fn new(config: RuntimeConfig, idle_cores: usize) -> Self {
        Self { config, idle_cores }
    }

    async fn call<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T, String> {
        let body = serde_json::to_vec(request).map_err(|e| e.to_string())?;

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .env("SYMERGION_IDLE_CORES", self.idle_cores.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("spawn {}: {e}", self.config.command))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(&body).await.map_err(|e| e.to_string())?;
            stdin.write_all(b"\n").await.map_err(|e| e.to_string())?;
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("timed out after {}s", self.config.timeout_secs))?
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        debug!(bytes = output.stdout.len(), "runtime responded");
        serde_json::from_slice(&output.stdout).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ModelRuntime for ProcessRuntime {
    async fn load(&self, checkpoint: &str) -> RuntimeResult<ModelHandle> {
        let response: LoadResponse = self
            .call(&Request::Load { checkpoint })
            .await
            .map_err(|reason| RuntimeError::LoadFailed {
                checkpoint: checkpoint.to_string(),
                reason,
            })?;
        Ok(ModelHandle {
            checkpoint: checkpoint.to_string(),
            max_position_embeddings: response.max_position_embeddings,
        })
    }

    async fn encode(&self, handle: &ModelHandle, text: &str) -> RuntimeResult<Vec<TokenId>> {
        let response: TokensResponse = self
            .call(&Request::Encode {
                checkpoint: &handle.checkpoint,
                text,
            })
            .await
            .map_err(|reason| RuntimeError::TokenizerFailed {
                checkpoint: handle.checkpoint.clone(),
                reason,
            })?;
        Ok(response.tokens)
    }

    async fn decode(&self, handle: &ModelHandle, tokens: &[TokenId]) -> RuntimeResult<String> {
        let response: TextResponse = self
            .call(&Request::Decode {
                checkpoint: &handle.checkpoint,
                tokens,
            })
            .await
            .map_err(|reason| RuntimeError::TokenizerFailed {
                checkpoint: handle.checkpoint.clone(),
                reason,
            })?;
        Ok(response.text)
    }

    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        max_new_tokens: usize,
    ) -> RuntimeResult<Vec<TokenId>> {
        let response: TokensResponse = self
            .call(&Request::Generate {
                checkpoint: &handle.checkpoint,
                prompt,
                max_new_tokens,
            })
            .await
            .map_err(|reason| RuntimeError::GenerationFailed {
                checkpoint: handle.checkpoint.clone(),
                reason,
            })?;
        Ok(response.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_runtime(response: &str) -> ProcessRuntime {
        ProcessRuntime::new(
            RuntimeConfig {
                command: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    format!("cat > /dev/null; echo '{response}'"),
                ],
                timeout_secs: 5,
            },
            1,
        )
    }

    #[tokio::test]
    async fn test_load_parses_context_window() {
        let runtime = echo_runtime(r#"{"max_position_embeddings": 2048}"#);
        let handle = runtime.load("workerA").await.unwrap();
        assert_eq!(handle.max_position_embeddings, 2048);
        assert_eq!(handle.checkpoint, "workerA");
    }

    #[tokio::test]
    async fn test_encode_parses_tokens() {
        let runtime = echo_runtime(r#"{"tokens": [1, 2, 3]}"#);
        let handle = ModelHandle {
            checkpoint: "workerA".to_string(),
            max_position_embeddings: 2048,
        };
        assert_eq!(runtime.encode(&handle, "abc").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_executable_is_load_failure() {
        let runtime = ProcessRuntime::new(
            RuntimeConfig {
                command: "definitely-not-a-runtime".to_string(),
                args: vec![],
                timeout_secs: 5,
            },
            1,
        );
        assert!(matches!(
            runtime.load("workerA").await,
            Err(RuntimeError::LoadFailed { .. })
        ));
    }
}
