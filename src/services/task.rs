//! Task lifecycle.
//!
//! A task binds one feature branch to a layered prompt and the coding workers
//! assigned to it. Worker responses are committed to per-worker branches named
//! `<worker-id>_<feature-branch>`, created lazily from the feature branch tip.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::prompt::PromptAssembler;
use crate::domain::models::template::TaskTemplate;
use crate::domain::ports::repository::{Repository, RepositoryState};

/// One live task bound to a feature branch.
pub struct Task {
    feature: String,
    template_kind: String,
    destination_file: String,
    prompt: PromptAssembler,
    /// Coding worker ids assigned to the task, in registration order.
    workers: Vec<String>,
    /// Worker branches known to exist.
    branches: HashSet<String>,
    /// Annotation ids already consumed.
    handled: HashSet<String>,
    initial_annotation: String,
}

impl Task {
    /// Instantiate a task from its initial annotation.
    ///
    /// Extracts the template parameters, strips them from the note to form
    /// the description, injects the source and (when present) destination
    /// files, and refines the call to action with the entities found in the
    /// source.
    pub async fn create(
        feature: &str,
        kind: &str,
        template: &TaskTemplate,
        note_text: &str,
        annotation_id: &str,
        repo: &dyn RepositoryState,
    ) -> DomainResult<Self> {
        let params = template.extract_params(kind, note_text)?;
        let destination_file = params
            .get("destination")
            .cloned()
            .ok_or_else(|| DomainError::MissingParameter {
                template: kind.to_string(),
                param: "destination".to_string(),
            })?;
        let description = template.strip_params(note_text)?;

        let source_code = match params.get("source") {
            Some(path) => Some(repo.read_file(path).await?),
            None => None,
        };
        let destination_code = if repo.file_exists(&destination_file).await? {
            Some(repo.read_file(&destination_file).await?)
        } else {
            None
        };

        let call_to_action = format!(
            "{}{}",
            template.call_to_action,
            entity_suffix(source_code.as_deref())
        );
        let prompt = PromptAssembler::new(
            call_to_action,
            description,
            source_code,
            destination_code,
            template.code_starter.clone(),
        );

        Ok(Self {
            feature: feature.to_string(),
            template_kind: kind.to_string(),
            destination_file,
            prompt,
            workers: Vec::new(),
            branches: HashSet::new(),
            handled: HashSet::from([annotation_id.to_string()]),
            initial_annotation: annotation_id.to_string(),
        })
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn template_kind(&self) -> &str {
        &self.template_kind
    }

    pub fn initial_annotation(&self) -> &str {
        &self.initial_annotation
    }

    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    pub fn attach_worker(&mut self, worker: &str) {
        if !self.workers.iter().any(|w| w == worker) {
            self.workers.push(worker.to_string());
        }
    }

    /// Branch a worker commits its responses to.
    pub fn worker_branch(&self, worker: &str) -> String {
        format!("{worker}_{}", self.feature)
    }

    pub fn register_branch(&mut self, branch: &str) {
        self.branches.insert(branch.to_string());
    }

    pub fn forget_branch(&mut self, branch: &str) {
        self.branches.remove(branch);
    }

    pub fn is_handled(&self, annotation: &str) -> bool {
        self.handled.contains(annotation)
    }

    /// Stack an annotation's feedback onto the prompt and mark it consumed.
    pub fn apply_feedback(&mut self, annotation: &str, text: &str) {
        self.prompt.push_feedback(annotation, text);
        self.handled.insert(annotation.to_string());
    }

    /// Unstack every segment of a removed annotation. Returns the removed
    /// feedback joined by newlines, or `None` when the annotation never
    /// contributed to this prompt.
    pub fn revert_feedback(&mut self, annotation: &str) -> Option<String> {
        if !self.prompt.contains_annotation(annotation) {
            return None;
        }
        let removed = self.prompt.remove_annotation(annotation);
        self.handled.remove(annotation);
        Some(removed.join("\n"))
    }

    pub fn contains_annotation(&self, annotation: &str) -> bool {
        self.prompt.contains_annotation(annotation)
    }

    pub fn set_enrichment(&mut self, enrichment: &str) {
        self.prompt.set_enrichment(enrichment);
    }

    /// Rendered prompt plus its commentary, captured together so a commit
    /// message always reflects the prompt that produced the response.
    pub fn render_pair(&self) -> (String, String) {
        (self.prompt.render(), self.prompt.commentary())
    }

    /// Commit a worker's response body to its branch, creating the branch
    /// from the feature tip on first use.
    pub async fn commit_response(
        &mut self,
        repo: &dyn Repository,
        worker: &str,
        body: &str,
        message: &str,
    ) -> DomainResult<()> {
        let branch = self.worker_branch(worker);
        if !self.branches.contains(&branch) {
            repo.create_branch(&branch, &self.feature).await?;
            self.branches.insert(branch.clone());
        }
        repo.commit_file(&branch, &self.destination_file, body, message, worker)
            .await?;
        Ok(())
    }

    /// Delete every worker branch of this task.
    pub async fn decommission(&mut self, repo: &dyn Repository) -> DomainResult<()> {
        for branch in self.branches.drain() {
            repo.delete_branch(&branch).await?;
        }
        Ok(())
    }

    /// Recover a reasoning enrichment from history after a restart.
    ///
    /// The initial commit message on a worker branch is the enriched
    /// commentary; when it extends the plain call to action and description,
    /// the remainder is the enrichment.
    pub async fn recover_enrichment(&self, repo: &dyn RepositoryState) -> Option<String> {
        let plain = self.prompt.plain_initial();
        for worker in &self.workers {
            let branch = self.worker_branch(worker);
            let messages = match repo.branch_messages(&self.feature, &branch).await {
                Ok(messages) => messages,
                Err(_) => continue,
            };
            if let Some(first) = messages.first() {
                if let Some(remainder) = first.strip_prefix(plain.as_str()) {
                    let remainder = remainder.trim();
                    if !remainder.is_empty() {
                        return Some(remainder.to_string());
                    }
                }
            }
        }
        None
    }
}

/// Refine a call to action with the classes and functions found in the
/// source file.
fn entity_suffix(source: Option<&str>) -> String {
    let Some(source) = source else {
        return String::new();
    };

    static CLASS: OnceLock<Regex> = OnceLock::new();
    static FUNCTION: OnceLock<Regex> = OnceLock::new();
    let class = CLASS.get_or_init(|| Regex::new(r"(?m)^class\s+(\w+)\s*[(:]").unwrap());
    let function = FUNCTION.get_or_init(|| Regex::new(r"(?m)^def\s+(\w+)\s*\(").unwrap());

    let mut parts: Vec<String> = class
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| format!(" for the class {}", m.as_str()))
        .collect();
    parts.extend(
        function
            .captures_iter(source)
            .filter_map(|c| c.get(1))
            .map(|m| format!(" for the function {}", m.as_str())),
    );

    if parts.is_empty() {
        " for the above code".to_string()
    } else {
        parts.join(",")
    }
}
