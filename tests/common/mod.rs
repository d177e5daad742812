//! Test doubles shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use symergion::domain::models::Annotation;
use symergion::domain::models::RepositoryRef;
use symergion::domain::ports::model_runtime::{
    ModelHandle, ModelRuntime, RuntimeError, RuntimeResult, TokenId,
};
use symergion::domain::ports::repository::{
    Repository, RepositoryError, RepositoryResult, RepositoryState,
};

/// One recorded commit on an in-memory branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub path: String,
    pub content: String,
    pub message: String,
    pub author: String,
}

#[derive(Default)]
struct RepoState {
    branches: Vec<String>,
    files: HashMap<String, String>,
    notes: Vec<Annotation>,
    containing: HashMap<String, Vec<String>>,
    commits: HashMap<String, Vec<CommitRecord>>,
    unreachable: bool,
}

/// In-memory repository double implementing both repository ports.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.branches.iter().any(|b| b == name) {
            state.branches.push(name.to_string());
        }
    }

    pub fn remove_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.branches.retain(|b| b != name);
        state.commits.remove(name);
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().branches.iter().any(|b| b == name)
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
    }

    pub fn add_note(&self, id: &str, target: &str, message: &str, secs: i64) {
        self.state.lock().unwrap().notes.push(Annotation {
            id: id.to_string(),
            target: target.to_string(),
            message: message.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        });
    }

    pub fn remove_note(&self, id: &str) {
        self.state.lock().unwrap().notes.retain(|n| n.id != id);
    }

    pub fn set_containing(&self, commit: &str, branches: &[&str]) {
        self.state.lock().unwrap().containing.insert(
            commit.to_string(),
            branches.iter().map(ToString::to_string).collect(),
        );
    }

    pub fn commits_on(&self, branch: &str) -> Vec<CommitRecord> {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(branch)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }
}

#[async_trait]
impl RepositoryState for InMemoryRepository {
    async fn list_branches(&self) -> RepositoryResult<Vec<RepositoryRef>> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(RepositoryError::Unreachable("offline".to_string()));
        }
        Ok(state
            .branches
            .iter()
            .map(|name| RepositoryRef::local(name.clone(), "tip"))
            .collect())
    }

    async fn list_annotations(&self) -> RepositoryResult<Vec<Annotation>> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(RepositoryError::Unreachable("offline".to_string()));
        }
        Ok(state.notes.clone())
    }

    async fn branches_containing(&self, commit: &str) -> RepositoryResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containing
            .get(commit)
            .cloned()
            .unwrap_or_default())
    }

    async fn branch_messages(&self, _feature: &str, branch: &str) -> RepositoryResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .commits
            .get(branch)
            .map(|commits| commits.iter().map(|c| c.message.clone()).collect())
            .unwrap_or_default())
    }

    async fn read_file(&self, path: &str) -> RepositoryResult<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))
    }

    async fn file_exists(&self, path: &str) -> RepositoryResult<bool> {
        Ok(self.state.lock().unwrap().files.contains_key(path))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_branch(&self, name: &str, _from: &str) -> RepositoryResult<()> {
        self.add_branch(name);
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> RepositoryResult<()> {
        self.remove_branch(name);
        Ok(())
    }

    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
        author: &str,
    ) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.iter().any(|b| b == branch) {
            return Err(RepositoryError::NotFound(branch.to_string()));
        }
        state
            .commits
            .entry(branch.to_string())
            .or_default()
            .push(CommitRecord {
                path: path.to_string(),
                content: content.to_string(),
                message: message.to_string(),
                author: author.to_string(),
            });
        Ok(())
    }
}

/// Scripted runtime double with per-checkpoint outputs and call counters.
pub struct ScriptedRuntime {
    window: usize,
    outputs: Mutex<HashMap<String, Vec<TokenId>>>,
    loads: AtomicUsize,
    generations: Mutex<HashMap<String, usize>>,
}

impl ScriptedRuntime {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            outputs: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(&self, checkpoint: &str, output: &[TokenId]) {
        self.outputs
            .lock()
            .unwrap()
            .insert(checkpoint.to_string(), output.to_vec());
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn generations(&self, checkpoint: &str) -> usize {
        self.generations
            .lock()
            .unwrap()
            .get(checkpoint)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn load(&self, checkpoint: &str) -> RuntimeResult<ModelHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(ModelHandle {
            checkpoint: checkpoint.to_string(),
            max_position_embeddings: self.window,
        })
    }

    async fn encode(&self, _: &ModelHandle, text: &str) -> RuntimeResult<Vec<TokenId>> {
        Ok(text.bytes().map(TokenId::from).collect())
    }

    async fn decode(&self, _: &ModelHandle, tokens: &[TokenId]) -> RuntimeResult<String> {
        let parts: Vec<String> = tokens.iter().map(ToString::to_string).collect();
        Ok(parts.join(" "))
    }

    async fn generate(
        &self,
        handle: &ModelHandle,
        _: &str,
        _: usize,
    ) -> RuntimeResult<Vec<TokenId>> {
        *self
            .generations
            .lock()
            .unwrap()
            .entry(handle.checkpoint.clone())
            .or_default() += 1;
        self.outputs
            .lock()
            .unwrap()
            .get(&handle.checkpoint)
            .cloned()
            .ok_or_else(|| RuntimeError::GenerationFailed {
                checkpoint: handle.checkpoint.clone(),
                reason: "no scripted output".to_string(),
            })
    }
}
