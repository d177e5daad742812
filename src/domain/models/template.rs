//! Declarative task templates.
//!
//! A template fixes the shape of one task kind: the named parameters an
//! initial annotation must carry (each matched by a configurable regex), the
//! call to action opening every prompt, and the code starter closing it.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Declarative description of one task kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Named parameter patterns; every parameter is required. The first
    /// capture group of each pattern yields the parameter value.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Instruction opening the prompt.
    pub call_to_action: String,
    /// Code fragment the generated body should continue from, appended as the
    /// prompt suffix.
    #[serde(default)]
    pub code_starter: String,
}

impl TaskTemplate {
    /// Extract every declared parameter from an initial annotation.
    ///
    /// Fails with [`DomainError::MissingParameter`] on the first parameter
    /// whose pattern does not match; the caller must then leave the task
    /// uninstantiated.
    pub fn extract_params(&self, kind: &str, note: &str) -> DomainResult<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        for (name, pattern) in &self.params {
            let regex = compile(pattern)?;
            let value = regex
                .captures(note)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| DomainError::MissingParameter {
                    template: kind.to_string(),
                    param: name.clone(),
                })?;
            values.insert(name.clone(), value);
        }
        Ok(values)
    }

    /// The annotation text with all parameter declarations removed: the task
    /// description that goes into the prompt.
    pub fn strip_params(&self, note: &str) -> DomainResult<String> {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for pattern in self.params.values() {
            let regex = compile(pattern)?;
            for found in regex.find_iter(note) {
                spans.push((found.start(), found.end()));
            }
        }
        spans.sort_unstable();

        let mut remaining = String::new();
        let mut cursor = 0;
        for (start, end) in spans {
            if start >= cursor {
                remaining.push_str(&note[cursor..start]);
            }
            cursor = cursor.max(end);
        }
        remaining.push_str(&note[cursor..]);

        let rows: Vec<&str> = remaining
            .lines()
            .map(|row| row.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ';'))
            .filter(|row| !row.is_empty())
            .collect();
        Ok(rows.join("\n"))
    }
}

fn compile(pattern: &str) -> DomainResult<Regex> {
    Regex::new(pattern).map_err(|err| DomainError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}
