//! Snapshot differ.
//!
//! Each poll compares the repository against the previous snapshot and emits
//! typed events exactly once. Any read failure is logged and yields no events
//! and no snapshot update, so an unreachable repository looks like a quiet
//! one and the missed changes surface on the next successful poll.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::models::annotation::Annotation;
use crate::domain::models::branch::{BranchKind, NamingScheme};
use crate::domain::models::event::RepoEvent;
use crate::domain::ports::repository::RepositoryState;

/// An annotation together with the managed branches that contained its
/// commit when it was observed.
#[derive(Debug, Clone)]
struct NoteRecord {
    annotation: Annotation,
    branches: Vec<String>,
}

#[derive(Debug, Default)]
struct RepoSnapshot {
    branches: HashSet<String>,
    notes: HashMap<String, NoteRecord>,
}

/// Stateful observer producing exactly-once change events.
#[derive(Debug, Default)]
pub struct StateDiffer {
    snapshot: RepoSnapshot,
}

impl StateDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the repository and return the changes since the last
    /// successful poll. The first poll reports the entire managed state as
    /// added, which doubles as startup synchronization.
    pub async fn poll(
        &mut self,
        repo: &dyn RepositoryState,
        naming: &NamingScheme,
    ) -> Vec<RepoEvent> {
        let refs = match repo.list_branches().await {
            Ok(refs) => refs,
            Err(err) => {
                warn!(error = %err, "branch listing failed, treating as no change");
                return Vec::new();
            }
        };
        let annotations = match repo.list_annotations().await {
            Ok(notes) => notes,
            Err(err) => {
                warn!(error = %err, "annotation listing failed, treating as no change");
                return Vec::new();
            }
        };

        let names: HashSet<String> = refs.into_iter().map(|r| r.name).collect();
        let mut events = Vec::new();

        let mut added: Vec<&String> = names.difference(&self.snapshot.branches).collect();
        added.sort();
        for name in added {
            match naming.classify(name) {
                BranchKind::Feature { template } => events.push(RepoEvent::FeatureBranchAdded {
                    branch: name.clone(),
                    template,
                }),
                BranchKind::Worker { worker, feature } => {
                    events.push(RepoEvent::WorkerBranchAdded {
                        branch: name.clone(),
                        worker,
                        feature,
                    });
                }
                BranchKind::Unmanaged => {}
            }
        }

        let mut removed: Vec<&String> = self.snapshot.branches.difference(&names).collect();
        removed.sort();
        for name in removed {
            match naming.classify(name) {
                BranchKind::Feature { .. } => events.push(RepoEvent::FeatureBranchRemoved {
                    branch: name.clone(),
                }),
                BranchKind::Worker { worker, feature } => {
                    events.push(RepoEvent::WorkerBranchRemoved {
                        branch: name.clone(),
                        worker,
                        feature,
                    });
                }
                BranchKind::Unmanaged => {}
            }
        }

        let current: HashMap<&str, &Annotation> =
            annotations.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut gone: Vec<&NoteRecord> = self
            .snapshot
            .notes
            .values()
            .filter(|record| !current.contains_key(record.annotation.id.as_str()))
            .collect();
        gone.sort_by_key(|record| record.annotation.timestamp);
        for record in gone {
            events.push(RepoEvent::AnnotationRemoved {
                annotation: record.annotation.clone(),
                branches: record.branches.clone(),
            });
        }

        let mut fresh: Vec<&Annotation> = annotations
            .iter()
            .filter(|a| !self.snapshot.notes.contains_key(&a.id))
            .collect();
        fresh.sort_by_key(|a| a.timestamp);

        let mut notes: HashMap<String, NoteRecord> = self
            .snapshot
            .notes
            .iter()
            .filter(|(id, _)| current.contains_key(id.as_str()))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        for annotation in fresh {
            let containing = match repo.branches_containing(&annotation.target).await {
                Ok(branches) => branches,
                Err(err) => {
                    warn!(error = %err, "commit lookup failed, treating as no change");
                    return Vec::new();
                }
            };
            let managed: Vec<String> = containing
                .into_iter()
                .filter(|b| !matches!(naming.classify(b), BranchKind::Unmanaged))
                .collect();
            events.push(RepoEvent::AnnotationAdded {
                annotation: annotation.clone(),
                branches: managed.clone(),
            });
            notes.insert(
                annotation.id.clone(),
                NoteRecord {
                    annotation: annotation.clone(),
                    branches: managed,
                },
            );
        }

        self.snapshot = RepoSnapshot {
            branches: names,
            notes,
        };
        events
    }
}
