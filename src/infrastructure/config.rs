//! Configuration loading and validation.
//!
//! Sources are layered defaults < JSON file < environment. Environment keys
//! use the `SYMERGION_` prefix with `__` as the nesting separator, e.g.
//! `SYMERGION_RUNTIME__COMMAND`. The loaded configuration is validated once;
//! everything downstream can assume it is coherent.

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use regex::Regex;
use thiserror::Error;

use crate::domain::models::checkpoint::WorkerRole;
use crate::domain::models::config::Config;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "SYMERGION_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] figment::Error),

    #[error("ntokens must be positive")]
    InvalidNtokens,

    #[error("default_branch must not be empty")]
    EmptyDefaultBranch,

    #[error("invalid task_branch_spec `{pattern}`: {reason}")]
    InvalidTaskBranchSpec { pattern: String, reason: String },

    #[error("at least one task template is required")]
    NoTemplates,

    #[error("at least one checkpoint is required")]
    NoCheckpoints,

    #[error("reasoning checkpoint `{0}` needs start and stop marker tokens")]
    MissingReasoningMarkers(String),

    #[error("template `{0}` has an empty call_to_action")]
    EmptyCallToAction(String),

    #[error("template `{template}` param `{param}` has invalid pattern: {reason}")]
    InvalidParamPattern {
        template: String,
        param: String,
        reason: String,
    },
}

/// Loads and validates the process configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the layered sources, reading `path` when it exists.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.ntokens == 0 {
            return Err(ConfigError::InvalidNtokens);
        }
        if config.default_branch.is_empty() {
            return Err(ConfigError::EmptyDefaultBranch);
        }

        match Regex::new(&config.task_branch_spec) {
            Ok(regex) if regex.captures_len() < 2 => {
                return Err(ConfigError::InvalidTaskBranchSpec {
                    pattern: config.task_branch_spec.clone(),
                    reason: "a capture group naming the branch is required".to_string(),
                });
            }
            Ok(_) => {}
            Err(err) => {
                return Err(ConfigError::InvalidTaskBranchSpec {
                    pattern: config.task_branch_spec.clone(),
                    reason: err.to_string(),
                });
            }
        }

        if config.templates.is_empty() {
            return Err(ConfigError::NoTemplates);
        }
        for (kind, template) in &config.templates {
            if template.call_to_action.is_empty() {
                return Err(ConfigError::EmptyCallToAction(kind.clone()));
            }
            for (param, pattern) in &template.params {
                match Regex::new(pattern) {
                    Ok(regex) if regex.captures_len() < 2 => {
                        return Err(ConfigError::InvalidParamPattern {
                            template: kind.clone(),
                            param: param.clone(),
                            reason: "a capture group yielding the value is required".to_string(),
                        });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        return Err(ConfigError::InvalidParamPattern {
                            template: kind.clone(),
                            param: param.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        if config.checkpoints.is_empty() {
            return Err(ConfigError::NoCheckpoints);
        }
        for checkpoint in &config.checkpoints {
            if checkpoint.role == WorkerRole::Reasoning
                && (checkpoint.reasoning_start_tokens.is_empty()
                    || checkpoint.reasoning_stop_tokens.is_empty())
            {
                return Err(ConfigError::MissingReasoningMarkers(
                    checkpoint.id().to_string(),
                ));
            }
        }

        Ok(())
    }
}
