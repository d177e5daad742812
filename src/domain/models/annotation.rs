//! Annotation (git note) domain model.
//!
//! Annotations are the sole feedback channel: out-of-line text attached to a
//! commit. One note body may carry several sub-notes, each addressed to a
//! different task branch via the configured task-branch pattern.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Commit message prefix the system writes when an annotation is removed.
/// Annotations carrying this prefix are self-authored and never re-consumed
/// as feedback.
pub const REVERT_PREFIX: &str = "Revert: ";

/// A note attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Stable identity of the note body (the note blob hash). Editing a note
    /// changes this id, which the differ reports as remove + add.
    pub id: String,
    /// Commit the note annotates.
    pub target: String,
    /// Full note body.
    pub message: String,
    /// Timestamp of the annotated commit, used to order annotation events.
    pub timestamp: DateTime<Utc>,
}

impl Annotation {
    /// True when the note is a revert marker the system wrote itself.
    pub fn is_self_authored(&self) -> bool {
        self.message.starts_with(REVERT_PREFIX)
    }
}

/// One routed slice of a note body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubNote {
    /// Branch named by the task-branch declaration, when present.
    pub branch: Option<String>,
    /// Feedback text with the declaration stripped.
    pub text: String,
}

/// Split a note body into sub-notes on the task-branch pattern.
///
/// The pattern's first capture group names the addressed branch. Text before
/// the first declaration (or the whole body when there is none) becomes a
/// sub-note with no explicit branch; the caller resolves it against the
/// branches containing the annotated commit.
pub fn split_sub_notes(message: &str, task_branch: &Regex) -> Vec<SubNote> {
    let mut sub_notes = Vec::new();
    let mut declarations = Vec::new();

    for captures in task_branch.captures_iter(message) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };
        let branch = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        declarations.push((whole.start(), whole.end(), branch));
    }

    let leading_end = declarations.first().map_or(message.len(), |(s, _, _)| *s);
    let leading = trim_sub_note(&message[..leading_end]);
    if !leading.is_empty() {
        sub_notes.push(SubNote {
            branch: None,
            text: leading,
        });
    }

    for (index, (_, end, branch)) in declarations.iter().enumerate() {
        let next_start = declarations
            .get(index + 1)
            .map_or(message.len(), |(s, _, _)| *s);
        sub_notes.push(SubNote {
            branch: Some(branch.clone()),
            text: trim_sub_note(&message[*end..next_start]),
        });
    }

    sub_notes
}

/// Non-empty trimmed lines of a feedback text; each becomes its own prompt
/// segment, keyed by line index.
pub fn feedback_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn trim_sub_note(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .to_string()
}
