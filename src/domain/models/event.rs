//! Typed repository change events.
//!
//! The differ turns raw branch and note diffs into these events; the
//! orchestrator routes them. This replaces observer-style dispatch with an
//! explicit fan-out.

use super::annotation::Annotation;

/// One observed repository change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEvent {
    /// A feature branch matching a configured template prefix appeared.
    FeatureBranchAdded {
        branch: String,
        template: String,
    },
    /// A feature branch disappeared.
    FeatureBranchRemoved {
        branch: String,
    },
    /// A per-worker branch appeared.
    WorkerBranchAdded {
        branch: String,
        worker: String,
        feature: String,
    },
    /// A per-worker branch disappeared.
    WorkerBranchRemoved {
        branch: String,
        worker: String,
        feature: String,
    },
    /// A note appeared on a commit; `branches` are the managed branches
    /// containing that commit at observation time.
    AnnotationAdded {
        annotation: Annotation,
        branches: Vec<String>,
    },
    /// A note disappeared; `branches` were recorded when the note was last
    /// observed, since the commit may no longer be reachable.
    AnnotationRemoved {
        annotation: Annotation,
        branches: Vec<String>,
    },
}
