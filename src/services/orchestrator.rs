//! Task orchestration.
//!
//! The orchestrator owns the differ, the workers, and the live task set. Each
//! tick polls the differ and routes the resulting events: feature branches
//! open and close tasks, worker branches are bookkeeping, and annotations
//! drive task creation, feedback rounds, and reverts. Failures are logged per
//! event so one bad annotation never stalls the loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::annotation::{split_sub_notes, Annotation, REVERT_PREFIX};
use crate::domain::models::branch::{BranchKind, NamingScheme};
use crate::domain::models::checkpoint::WorkerRole;
use crate::domain::models::config::Config;
use crate::domain::models::event::RepoEvent;
use crate::domain::ports::model_runtime::ModelRuntime;
use crate::domain::ports::repository::Repository;
use crate::services::cache::ModelCache;
use crate::services::differ::StateDiffer;
use crate::services::task::Task;
use crate::services::worker::Worker;

/// Reconciles repository state with the live set of tasks and workers.
pub struct TaskOrchestrator<R: Repository> {
    repo: Arc<R>,
    config: Config,
    task_branch: Regex,
    workers: Vec<Worker>,
    tasks: HashMap<String, Task>,
    /// Feature branches seen but not yet instantiated by a valid initial
    /// annotation.
    pending: HashSet<String>,
    differ: StateDiffer,
}

impl<R: Repository> TaskOrchestrator<R> {
    pub fn new(
        repo: Arc<R>,
        runtime: Arc<dyn ModelRuntime>,
        config: Config,
    ) -> DomainResult<Self> {
        let task_branch =
            Regex::new(&config.task_branch_spec).map_err(|err| DomainError::InvalidPattern {
                pattern: config.task_branch_spec.clone(),
                reason: err.to_string(),
            })?;
        let models = Arc::new(ModelCache::new(config.model_cache_size));
        let workers = config
            .checkpoints
            .iter()
            .map(|spec| {
                Worker::new(
                    spec.clone(),
                    config.ntokens,
                    config.response_cache_size,
                    Arc::clone(&runtime),
                    Arc::clone(&models),
                )
            })
            .collect();

        Ok(Self {
            repo,
            config,
            task_branch,
            workers,
            tasks: HashMap::new(),
            pending: HashSet::new(),
            differ: StateDiffer::new(),
        })
    }

    /// The naming convention derived from configured templates and coding
    /// workers.
    pub fn naming(&self) -> NamingScheme {
        let templates = self.config.templates.keys().cloned().collect();
        let coders = self
            .workers
            .iter()
            .filter(|w| w.role() == WorkerRole::Coding)
            .map(|w| w.id().to_string())
            .collect();
        NamingScheme::new(templates, coders)
    }

    pub fn task(&self, feature: &str) -> Option<&Task> {
        self.tasks.get(feature)
    }

    pub fn is_pending(&self, feature: &str) -> bool {
        self.pending.contains(feature)
    }

    /// One reconciliation tick: poll the differ and route every event.
    /// Returns the number of events observed.
    pub async fn tick(&mut self) -> usize {
        let naming = self.naming();
        let events = self.differ.poll(self.repo.as_ref(), &naming).await;
        let count = events.len();
        for event in events {
            debug!(?event, "routing repository event");
            if let Err(err) = self.handle_event(event).await {
                warn!(error = %err, "event handling failed");
            }
        }
        count
    }

    async fn handle_event(&mut self, event: RepoEvent) -> DomainResult<()> {
        match event {
            RepoEvent::FeatureBranchAdded { branch, template } => {
                if !self.tasks.contains_key(&branch) {
                    info!(%branch, %template, "feature branch observed, awaiting initial annotation");
                    self.pending.insert(branch);
                }
                Ok(())
            }
            RepoEvent::FeatureBranchRemoved { branch } => {
                self.pending.remove(&branch);
                if let Some(mut task) = self.tasks.remove(&branch) {
                    info!(%branch, "feature branch removed, decommissioning task");
                    task.decommission(self.repo.as_ref()).await?;
                }
                Ok(())
            }
            RepoEvent::WorkerBranchAdded { branch, feature, .. } => {
                if let Some(task) = self.tasks.get_mut(&feature) {
                    task.register_branch(&branch);
                }
                Ok(())
            }
            RepoEvent::WorkerBranchRemoved { branch, feature, .. } => {
                if let Some(task) = self.tasks.get_mut(&feature) {
                    task.forget_branch(&branch);
                }
                Ok(())
            }
            RepoEvent::AnnotationAdded {
                annotation,
                branches,
            } => self.handle_annotation_added(&annotation, &branches).await,
            RepoEvent::AnnotationRemoved { annotation, .. } => {
                self.handle_annotation_removed(&annotation).await
            }
        }
    }

    async fn handle_annotation_added(
        &mut self,
        annotation: &Annotation,
        branches: &[String],
    ) -> DomainResult<()> {
        let naming = self.naming();
        let task_branch = self.task_branch.clone();
        for sub in split_sub_notes(&annotation.message, &task_branch) {
            if sub.text.starts_with(REVERT_PREFIX) {
                debug!(note = %annotation.id, "skipping self-authored revert marker");
                continue;
            }
            let targets: Vec<String> = match sub.branch {
                Some(branch) => vec![branch],
                None => branches.to_vec(),
            };
            if targets.is_empty() {
                warn!(note = %annotation.id, "cannot resolve a branch for note, dropping it");
                continue;
            }
            for target in targets {
                if let Err(err) = self
                    .route_sub_note(&naming, annotation, &target, &sub.text)
                    .await
                {
                    warn!(note = %annotation.id, branch = %target, error = %err, "sub-note dropped");
                }
            }
        }
        Ok(())
    }

    async fn route_sub_note(
        &mut self,
        naming: &NamingScheme,
        annotation: &Annotation,
        target: &str,
        text: &str,
    ) -> DomainResult<()> {
        match naming.classify(target) {
            BranchKind::Worker { worker, feature } => {
                let task = self
                    .tasks
                    .get_mut(&feature)
                    .ok_or_else(|| DomainError::TaskNotFound(feature.clone()))?;
                if task.is_handled(&annotation.id) {
                    return Ok(());
                }
                task.apply_feedback(&annotation.id, text);
                self.run_round(&feature, Some(worker.as_str()), Some(text.to_string()))
                    .await
            }
            BranchKind::Feature { .. } => {
                if let Some(task) = self.tasks.get_mut(target) {
                    if task.is_handled(&annotation.id) {
                        return Ok(());
                    }
                    task.apply_feedback(&annotation.id, text);
                    self.run_round(target, None, Some(text.to_string())).await
                } else if self.pending.contains(target) {
                    self.create_task(naming, target, text, &annotation.id).await
                } else {
                    Err(DomainError::TaskNotFound(target.to_string()))
                }
            }
            BranchKind::Unmanaged => Ok(()),
        }
    }

    async fn handle_annotation_removed(&mut self, annotation: &Annotation) -> DomainResult<()> {
        // Removing the initial annotation resets the task to pending.
        let reset: Option<String> = self
            .tasks
            .values()
            .find(|t| t.initial_annotation() == annotation.id)
            .map(|t| t.feature().to_string());
        if let Some(feature) = reset {
            info!(%feature, "initial annotation removed, resetting task");
            if let Some(mut task) = self.tasks.remove(&feature) {
                task.decommission(self.repo.as_ref()).await?;
            }
            self.pending.insert(feature);
            return Ok(());
        }

        let feature: Option<String> = self
            .tasks
            .values()
            .find(|t| t.contains_annotation(&annotation.id))
            .map(|t| t.feature().to_string());
        let Some(feature) = feature else {
            debug!(note = %annotation.id, "removed annotation matched no task");
            return Ok(());
        };

        let removed = self
            .tasks
            .get_mut(&feature)
            .and_then(|task| task.revert_feedback(&annotation.id));
        if let Some(text) = removed {
            info!(%feature, note = %annotation.id, "annotation removed, reverting feedback");
            self.run_round(&feature, None, Some(format!("{REVERT_PREFIX}{text}")))
                .await?;
        }
        Ok(())
    }

    /// Instantiate a task from its initial annotation and run the first
    /// round.
    async fn create_task(
        &mut self,
        naming: &NamingScheme,
        feature: &str,
        note_text: &str,
        annotation_id: &str,
    ) -> DomainResult<()> {
        let kind = naming
            .template_of(feature)
            .ok_or_else(|| DomainError::UnknownTemplate {
                branch: feature.to_string(),
                supported: naming.supported_templates(),
            })?;
        let template = self
            .config
            .templates
            .get(&kind)
            .cloned()
            .ok_or_else(|| DomainError::UnknownTemplate {
                branch: feature.to_string(),
                supported: naming.supported_templates(),
            })?;

        let mut task = Task::create(
            feature,
            &kind,
            &template,
            note_text,
            annotation_id,
            self.repo.as_ref(),
        )
        .await?;

        for worker in &self.workers {
            if worker.role() == WorkerRole::Coding {
                task.attach_worker(worker.id());
            }
        }
        if let Ok(refs) = self.repo.list_branches().await {
            for reference in refs {
                if let BranchKind::Worker { feature: f, .. } = naming.classify(&reference.name) {
                    if f == feature {
                        task.register_branch(&reference.name);
                    }
                }
            }
        }

        let enrichment = match task.recover_enrichment(self.repo.as_ref()).await {
            Some(recovered) => {
                info!(%feature, "recovered reasoning enrichment from branch history");
                Some(recovered)
            }
            None => self.reasoning_enrichment(&task).await,
        };
        if let Some(enrichment) = enrichment {
            task.set_enrichment(&enrichment);
        }

        info!(%feature, template = %kind, "task created");
        self.pending.remove(feature);
        self.tasks.insert(feature.to_string(), task);
        self.run_round(feature, None, None).await
    }

    /// Ask every reasoning worker for an enrichment, sequentially. A failed
    /// reasoner contributes nothing; the task proceeds without it.
    async fn reasoning_enrichment(&mut self, task: &Task) -> Option<String> {
        let (prompt, _) = task.render_pair();
        let mut pieces = Vec::new();
        for worker in self
            .workers
            .iter_mut()
            .filter(|w| w.role() == WorkerRole::Reasoning)
        {
            match worker.generate(&prompt).await {
                Ok(output) if !output.text.is_empty() => pieces.push(output.text),
                Ok(_) => {}
                Err(err) => {
                    warn!(worker = %worker.id(), error = %err, "reasoning round failed");
                }
            }
        }
        if pieces.is_empty() {
            None
        } else {
            Some(pieces.join("\n"))
        }
    }

    /// Run one generation round for a task: concurrent generation across the
    /// selected coding workers, then sequential commits. The prompt and its
    /// commentary are snapshotted before generation so every commit message
    /// reflects the prompt that produced it.
    async fn run_round(
        &mut self,
        feature: &str,
        only: Option<&str>,
        comment: Option<String>,
    ) -> DomainResult<()> {
        let task = self
            .tasks
            .get_mut(feature)
            .ok_or_else(|| DomainError::TaskNotFound(feature.to_string()))?;
        let (prompt, commentary) = task.render_pair();
        let message = comment.unwrap_or(commentary);
        let assigned: Vec<String> = task.workers().to_vec();

        let jobs: Vec<_> = self
            .workers
            .iter_mut()
            .filter(|w| {
                w.role() == WorkerRole::Coding
                    && assigned.iter().any(|a| a == w.id())
                    && only.is_none_or(|o| o == w.id())
            })
            .map(|worker| {
                let prompt = prompt.clone();
                async move {
                    let id = worker.id().to_string();
                    let result = worker.generate(&prompt).await;
                    (id, result)
                }
            })
            .collect();
        let results = join_all(jobs).await;

        for (worker, result) in results {
            match result {
                Ok(output) => {
                    debug!(%feature, %worker, cached = output.cached, "committing response");
                    task.commit_response(self.repo.as_ref(), &worker, &output.text, &message)
                        .await?;
                }
                Err(err) => {
                    warn!(%feature, %worker, error = %err, "generation failed, round continues");
                }
            }
        }
        Ok(())
    }
}
