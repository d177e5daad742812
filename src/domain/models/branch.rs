//! Branch domain model.
//!
//! Feature branches and per-worker branches are both plain git branches,
//! distinguished only by naming convention:
//! `<template-prefix>_<feature>` vs `<worker-id>_<template-prefix>_<feature>`.

use serde::{Deserialize, Serialize};

/// A named branch observed in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Branch name, without any `refs/` or remote prefix.
    pub name: String,
    /// Commit the branch currently points at.
    pub target: String,
    /// Whether this ref was observed on the remote.
    pub is_remote: bool,
}

impl RepositoryRef {
    /// Create a local branch ref.
    pub fn local(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            is_remote: false,
        }
    }

    /// Create a remote branch ref.
    pub fn remote(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            is_remote: true,
        }
    }
}

/// What a branch name means under the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchKind {
    /// A feature branch defining one task, e.g. `TestCase_foo`.
    Feature {
        /// Template prefix the branch name starts with.
        template: String,
    },
    /// A per-worker branch holding generated commits, e.g. `workerA_TestCase_foo`.
    Worker {
        /// Worker id the branch belongs to.
        worker: String,
        /// Feature branch this worker branch tracks.
        feature: String,
    },
    /// A branch the system does not manage.
    Unmanaged,
}

/// The naming convention shared by the differ and the orchestrator.
///
/// Holds the configured template prefixes and the registered coding worker
/// ids; both sets are fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    templates: Vec<String>,
    workers: Vec<String>,
}

impl NamingScheme {
    /// Build a scheme from template prefixes and coding worker ids.
    ///
    /// Longer names are matched first so that a worker id which is itself a
    /// prefix of another cannot shadow it.
    pub fn new(templates: Vec<String>, workers: Vec<String>) -> Self {
        let mut templates = templates;
        let mut workers = workers;
        templates.sort_by_key(|t| std::cmp::Reverse(t.len()));
        workers.sort_by_key(|w| std::cmp::Reverse(w.len()));
        Self { templates, workers }
    }

    /// Classify a branch name.
    pub fn classify(&self, name: &str) -> BranchKind {
        for worker in &self.workers {
            if let Some(rest) = name.strip_prefix(worker).and_then(|r| r.strip_prefix('_')) {
                if self.template_of(rest).is_some() {
                    return BranchKind::Worker {
                        worker: worker.clone(),
                        feature: rest.to_string(),
                    };
                }
            }
        }
        if let Some(template) = self.template_of(name) {
            return BranchKind::Feature { template };
        }
        BranchKind::Unmanaged
    }

    /// Template prefix a feature branch name starts with, if any.
    pub fn template_of(&self, name: &str) -> Option<String> {
        self.templates
            .iter()
            .find(|t| {
                name.strip_prefix(t.as_str())
                    .and_then(|r| r.strip_prefix('_'))
                    .is_some_and(|r| !r.is_empty())
            })
            .cloned()
    }

    /// Alternation of supported template prefixes, for error messages.
    pub fn supported_templates(&self) -> String {
        self.templates.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> NamingScheme {
        NamingScheme::new(
            vec!["TestCase".to_string(), "Refactor".to_string()],
            vec!["workerA".to_string(), "workerB".to_string()],
        )
    }

    #[test]
    fn test_classify_feature_branch() {
        assert_eq!(
            scheme().classify("TestCase_foo"),
            BranchKind::Feature {
                template: "TestCase".to_string()
            }
        );
    }

    #[test]
    fn test_classify_worker_branch() {
        assert_eq!(
            scheme().classify("workerA_TestCase_foo"),
            BranchKind::Worker {
                worker: "workerA".to_string(),
                feature: "TestCase_foo".to_string()
            }
        );
    }

    #[test]
    fn test_classify_unmanaged() {
        assert_eq!(scheme().classify("main"), BranchKind::Unmanaged);
        assert_eq!(scheme().classify("workerA_main"), BranchKind::Unmanaged);
        // A bare template prefix with no feature name is not a feature branch.
        assert_eq!(scheme().classify("TestCase"), BranchKind::Unmanaged);
        assert_eq!(scheme().classify("TestCase_"), BranchKind::Unmanaged);
    }

    #[test]
    fn test_worker_id_prefix_does_not_shadow() {
        let scheme = NamingScheme::new(
            vec!["TestCase".to_string()],
            vec!["coder".to_string(), "coder2".to_string()],
        );
        assert_eq!(
            scheme.classify("coder2_TestCase_foo"),
            BranchKind::Worker {
                worker: "coder2".to_string(),
                feature: "TestCase_foo".to_string()
            }
        );
    }
}
