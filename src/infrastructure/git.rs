//! Git adapter.
//!
//! Shells out to the `git` binary against a local clone of the served
//! repository. Reads start with a pruning fetch so the local view tracks the
//! remote; a repository without an `origin` remote works too and skips the
//! sync, which keeps tests and local setups simple.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::DateTime;
use tokio::process::Command;
use tracing::debug;

use crate::domain::models::annotation::Annotation;
use crate::domain::models::branch::RepositoryRef;
use crate::domain::ports::repository::{
    Repository, RepositoryError, RepositoryResult, RepositoryState,
};

/// Repository adapter backed by the `git` CLI.
pub struct GitRepository {
    workdir: PathBuf,
    default_branch: String,
}

impl GitRepository {
    pub fn new(workdir: impl Into<PathBuf>, default_branch: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            default_branch: default_branch.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn git(&self, args: &[&str]) -> RepositoryResult<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.workdir)
            .args(args)
            .output()
            .await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if is_unreachable(&stderr) {
                Err(RepositoryError::Unreachable(stderr))
            } else {
                Err(RepositoryError::CommandFailed {
                    command: args.join(" "),
                    stderr,
                })
            }
        }
    }

    async fn has_remote(&self) -> RepositoryResult<bool> {
        let remotes = self.git(&["remote"]).await?;
        Ok(remotes.lines().any(|r| r == "origin"))
    }

    /// Sync branches and notes from the remote, pruning refs that no longer
    /// exist there. No-op without an `origin` remote.
    async fn sync(&self) -> RepositoryResult<()> {
        if !self.has_remote().await? {
            return Ok(());
        }
        self.git(&["fetch", "--prune", "--quiet", "origin"]).await?;
        self.git(&[
            "fetch",
            "--quiet",
            "origin",
            "+refs/notes/*:refs/notes/*",
        ])
        .await?;
        Ok(())
    }

    async fn push(&self, args: &[&str]) -> RepositoryResult<()> {
        if !self.has_remote().await? {
            return Ok(());
        }
        let mut full = vec!["push", "--quiet", "origin"];
        full.extend_from_slice(args);
        self.git(&full).await?;
        Ok(())
    }

    async fn commit_timestamp(&self, commit: &str) -> RepositoryResult<DateTime<chrono::Utc>> {
        let raw = self
            .git(&["show", "-s", "--format=%ct", commit])
            .await?;
        let secs: i64 = raw
            .trim()
            .parse()
            .map_err(|_| RepositoryError::NotFound(format!("timestamp of {commit}")))?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| RepositoryError::NotFound(format!("timestamp of {commit}")))
    }
}

#[async_trait]
impl RepositoryState for GitRepository {
    async fn list_branches(&self) -> RepositoryResult<Vec<RepositoryRef>> {
        self.sync().await?;
        let raw = self
            .git(&[
                "for-each-ref",
                "--format=%(refname:short) %(objectname)",
                "refs/heads",
                "refs/remotes/origin",
            ])
            .await?;

        let mut refs = Vec::new();
        for line in raw.lines() {
            let Some((name, target)) = line.split_once(' ') else {
                continue;
            };
            if name == "origin/HEAD" || name == "origin" {
                continue;
            }
            match name.strip_prefix("origin/") {
                Some(short) => refs.push(RepositoryRef::remote(short, target)),
                None => refs.push(RepositoryRef::local(name, target)),
            }
        }
        Ok(refs)
    }

    async fn list_annotations(&self) -> RepositoryResult<Vec<Annotation>> {
        self.sync().await?;
        // Notes on commits that got pruned away are stale; drop them before
        // listing. A failure here is not observation-critical.
        if let Err(err) = self.git(&["notes", "prune"]).await {
            debug!(error = %err, "notes prune skipped");
        }

        let raw = match self.git(&["notes", "list"]).await {
            Ok(raw) => raw,
            // An empty notes ref is not an error condition.
            Err(RepositoryError::CommandFailed { .. }) => String::new(),
            Err(err) => return Err(err),
        };

        let mut annotations = Vec::new();
        for line in raw.lines() {
            let Some((note, commit)) = line.split_once(' ') else {
                continue;
            };
            let message = self.git(&["notes", "show", commit]).await?;
            let timestamp = self.commit_timestamp(commit).await?;
            annotations.push(Annotation {
                id: note.to_string(),
                target: commit.to_string(),
                message: message.trim_end().to_string(),
                timestamp,
            });
        }
        annotations.sort_by_key(|a| std::cmp::Reverse(a.timestamp));
        Ok(annotations)
    }

    async fn branches_containing(&self, commit: &str) -> RepositoryResult<Vec<String>> {
        let raw = self
            .git(&[
                "branch",
                "--contains",
                commit,
                "--format=%(refname:short)",
            ])
            .await?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != self.default_branch)
            .map(ToString::to_string)
            .collect())
    }

    async fn branch_messages(&self, feature: &str, branch: &str) -> RepositoryResult<Vec<String>> {
        let range = format!("{feature}..{branch}");
        let raw = self
            .git(&["log", "--reverse", "--format=%B%x00", &range])
            .await?;
        Ok(raw
            .split('\0')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn read_file(&self, path: &str) -> RepositoryResult<String> {
        let spec = format!("{}:{path}", self.default_branch);
        self.git(&["show", &spec])
            .await
            .map_err(|_| RepositoryError::NotFound(path.to_string()))
    }

    async fn file_exists(&self, path: &str) -> RepositoryResult<bool> {
        let spec = format!("{}:{path}", self.default_branch);
        Ok(self.git(&["cat-file", "-e", &spec]).await.is_ok())
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn create_branch(&self, name: &str, from: &str) -> RepositoryResult<()> {
        self.git(&["branch", name, from]).await?;
        self.push(&[name]).await
    }

    async fn delete_branch(&self, name: &str) -> RepositoryResult<()> {
        if let Err(err) = self.git(&["branch", "-D", name]).await {
            debug!(branch = name, error = %err, "local branch already gone");
        }
        self.push(&["--delete", name]).await
    }

    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
        author: &str,
    ) -> RepositoryResult<()> {
        self.git(&["checkout", "--quiet", branch]).await?;
        let result = self.write_and_commit(path, content, message, author).await;
        // Always return to the default branch, even when the commit failed.
        let restore = self
            .git(&["checkout", "--quiet", &self.default_branch])
            .await;
        result?;
        restore?;
        self.push(&[branch]).await
    }
}

impl GitRepository {
    async fn write_and_commit(
        &self,
        path: &str,
        content: &str,
        message: &str,
        author: &str,
    ) -> RepositoryResult<()> {
        tokio::fs::write(self.workdir.join(path), content).await?;
        self.git(&["add", path]).await?;
        let name = format!("user.name={author}");
        let email = format!("user.email={author}@symergion.local");
        self.git(&["-c", &name, "-c", &email, "commit", "--quiet", "-m", message])
            .await?;
        Ok(())
    }
}

fn is_unreachable(stderr: &str) -> bool {
    stderr.contains("Could not read from remote")
        || stderr.contains("unable to access")
        || stderr.contains("Could not resolve host")
}
