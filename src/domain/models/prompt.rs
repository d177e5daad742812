//! Layered prompt assembly.
//!
//! A prompt is an ordered sequence of segments: structural ones derived from
//! the task template and injected file contents, plus one feedback segment
//! per annotation line. Segments can be appended and removed individually;
//! removing a segment leaves every other segment and their relative order
//! untouched, so reverting the most recent annotation restores the rendered
//! text byte for byte.

use super::annotation::feedback_lines;

/// Line appended to every reasoning enrichment to keep coding output terse.
const LACONIC_SUFFIX: &str = "Being laconic and return code only is at high importance";

/// Fixed structural positions within a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralSlot {
    /// Template call to action, possibly refined with source entities.
    CallToAction,
    /// Initial task description from the annotation.
    Description,
    /// Reasoning enrichment produced by reasoning workers.
    Reasoning,
    /// Injected source file content.
    SourceCode,
    /// Injected destination file content, when the file already exists.
    DestinationCode,
    /// Template code starter, always the prompt suffix.
    CodeStarter,
}

/// Where a segment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOrigin {
    /// Template- or file-derived segment.
    Structural(StructuralSlot),
    /// One line of one annotation's feedback.
    Feedback {
        /// Annotation id the line came from.
        annotation: String,
        /// Line index within the annotation body.
        line: usize,
    },
}

/// Ordered unit within a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSegment {
    pub origin: SegmentOrigin,
    pub text: String,
}

impl PromptSegment {
    fn structural(slot: StructuralSlot, text: String) -> Self {
        Self {
            origin: SegmentOrigin::Structural(slot),
            text,
        }
    }

    fn slot(&self) -> Option<StructuralSlot> {
        match self.origin {
            SegmentOrigin::Structural(slot) => Some(slot),
            SegmentOrigin::Feedback { .. } => None,
        }
    }

    /// Whether the segment renders as `#`-prefixed commentary rather than raw
    /// code.
    fn is_commentary(&self) -> bool {
        !matches!(
            self.slot(),
            Some(
                StructuralSlot::SourceCode
                    | StructuralSlot::DestinationCode
                    | StructuralSlot::CodeStarter
            )
        )
    }
}

/// An ordered, append/remove-capable sequence of prompt segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    segments: Vec<PromptSegment>,
}

impl PromptAssembler {
    /// Assemble the structural segments for a new task.
    ///
    /// Layout: call to action, description, (reasoning), source code,
    /// destination code, feedback, code starter. Optional parts are omitted
    /// rather than rendered empty.
    pub fn new(
        call_to_action: String,
        description: String,
        source_code: Option<String>,
        destination_code: Option<String>,
        code_starter: String,
    ) -> Self {
        let mut segments = Vec::new();
        segments.push(PromptSegment::structural(
            StructuralSlot::CallToAction,
            call_to_action,
        ));
        if !description.is_empty() {
            segments.push(PromptSegment::structural(
                StructuralSlot::Description,
                description,
            ));
        }
        if let Some(source) = source_code {
            segments.push(PromptSegment::structural(StructuralSlot::SourceCode, source));
        }
        if let Some(destination) = destination_code {
            segments.push(PromptSegment::structural(
                StructuralSlot::DestinationCode,
                destination,
            ));
        }
        if !code_starter.is_empty() {
            segments.push(PromptSegment::structural(
                StructuralSlot::CodeStarter,
                code_starter,
            ));
        }
        Self { segments }
    }

    /// Install or replace the reasoning enrichment, normalized with the
    /// laconic suffix. Empty enrichment removes the slot.
    pub fn set_enrichment(&mut self, enrichment: &str) {
        self.segments
            .retain(|s| s.slot() != Some(StructuralSlot::Reasoning));

        let formatted = format_enrichment(enrichment);
        if formatted.is_empty() {
            return;
        }

        // Reasoning sits right after the description (or the call to action
        // when the annotation carried no free text).
        let at = self
            .segments
            .iter()
            .position(|s| {
                !matches!(
                    s.slot(),
                    Some(StructuralSlot::CallToAction | StructuralSlot::Description)
                )
            })
            .unwrap_or(self.segments.len());
        self.segments.insert(
            at,
            PromptSegment::structural(StructuralSlot::Reasoning, formatted),
        );
    }

    /// Append one feedback segment per non-empty line of `text`, keyed by the
    /// annotation id and line index. Returns the number of segments added.
    pub fn push_feedback(&mut self, annotation: &str, text: &str) -> usize {
        let lines = feedback_lines(text);
        let added = lines.len();
        // Feedback stacks after everything except the code starter suffix.
        let mut at = self
            .segments
            .iter()
            .position(|s| s.slot() == Some(StructuralSlot::CodeStarter))
            .unwrap_or(self.segments.len());
        for (line, content) in lines.into_iter().enumerate() {
            self.segments.insert(
                at,
                PromptSegment {
                    origin: SegmentOrigin::Feedback {
                        annotation: annotation.to_string(),
                        line,
                    },
                    text: content,
                },
            );
            at += 1;
        }
        added
    }

    /// Remove every segment derived from `annotation`, returning the removed
    /// texts in order. All other segments keep their relative order.
    pub fn remove_annotation(&mut self, annotation: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.segments.retain(|segment| {
            match &segment.origin {
                SegmentOrigin::Feedback { annotation: id, .. } if id == annotation => {
                    removed.push(segment.text.clone());
                    false
                }
                _ => true,
            }
        });
        removed
    }

    /// Whether any segment came from `annotation`.
    pub fn contains_annotation(&self, annotation: &str) -> bool {
        self.segments.iter().any(|segment| {
            matches!(
                &segment.origin,
                SegmentOrigin::Feedback { annotation: id, .. } if id == annotation
            )
        })
    }

    /// Feedback texts in stacking order.
    pub fn feedback_texts(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| matches!(s.origin, SegmentOrigin::Feedback { .. }))
            .map(|s| s.text.as_str())
            .collect()
    }

    /// Render the full prompt body sent to a model.
    pub fn render(&self) -> String {
        let pieces: Vec<String> = self
            .segments
            .iter()
            .map(|segment| {
                if segment.is_commentary() {
                    comment_lines(&segment.text)
                } else if segment.slot() == Some(StructuralSlot::CodeStarter) {
                    segment.text.clone()
                } else {
                    // Injected code keeps a trailing blank line as separator.
                    format!("{}\n", segment.text)
                }
            })
            .collect();
        pieces.join("\n")
    }

    /// Render the prompt minus the raw injected file contents and the code
    /// starter: the human-scannable text used for commit messages.
    pub fn commentary(&self) -> String {
        let pieces: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| s.is_commentary())
            .map(|s| s.text.as_str())
            .collect();
        pieces.join("\n")
    }

    /// The call to action and description alone, before any enrichment; used
    /// to recognize an enriched initial commit message in history.
    pub fn plain_initial(&self) -> String {
        let pieces: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| {
                matches!(
                    s.slot(),
                    Some(StructuralSlot::CallToAction | StructuralSlot::Description)
                )
            })
            .map(|s| s.text.as_str())
            .collect();
        pieces.join("\n")
    }
}

/// Normalize a reasoning enrichment: trim and ensure the laconic suffix.
pub fn format_enrichment(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with(LACONIC_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}\n{LACONIC_SUFFIX}")
    }
}

fn comment_lines(text: &str) -> String {
    let rows: Vec<String> = text
        .lines()
        .filter(|row| !row.is_empty())
        .map(|row| format!("# {row}"))
        .collect();
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(
            "Write unit tests for the class Greeter".to_string(),
            "Cover the edge cases".to_string(),
            Some("class Greeter:\n    pass".to_string()),
            None,
            "import unittest".to_string(),
        )
    }

    #[test]
    fn test_render_layout() {
        let rendered = assembler().render();
        assert_eq!(
            rendered,
            "# Write unit tests for the class Greeter\n\
             # Cover the edge cases\n\
             class Greeter:\n    pass\n\n\
             import unittest"
        );
    }

    #[test]
    fn test_feedback_stacks_before_code_starter() {
        let mut prompt = assembler();
        prompt.push_feedback("n1", "Use setUp method");
        let rendered = prompt.render();
        assert!(rendered.contains("# Use setUp method\nimport unittest"));
    }

    #[test]
    fn test_remove_restores_rendered_text() {
        let mut prompt = assembler();
        prompt.push_feedback("n1", "Use setUp method");
        let before = prompt.render();

        prompt.push_feedback("n2", "Avoid mocks\nPrefer fixtures");
        assert_ne!(prompt.render(), before);

        let removed = prompt.remove_annotation("n2");
        assert_eq!(removed, vec!["Avoid mocks", "Prefer fixtures"]);
        assert_eq!(prompt.render(), before);
    }

    #[test]
    fn test_remove_keeps_structural_segments() {
        let mut prompt = assembler();
        prompt.push_feedback("n1", "Use setUp method");
        prompt.remove_annotation("n1");
        assert_eq!(prompt.render(), assembler().render());
    }

    #[test]
    fn test_enrichment_sits_after_description() {
        let mut prompt = assembler();
        prompt.set_enrichment("Consider boundary values first");
        let rendered = prompt.render();
        let description = rendered.find("# Cover the edge cases").unwrap();
        let enrichment = rendered.find("# Consider boundary values first").unwrap();
        // The call to action also mentions the class name; the colon pins the
        // match to the injected source.
        let source = rendered.find("class Greeter:").unwrap();
        assert!(description < enrichment && enrichment < source);
        assert!(rendered.contains(LACONIC_SUFFIX));
    }

    #[test]
    fn test_empty_enrichment_is_omitted() {
        let mut prompt = assembler();
        prompt.set_enrichment("");
        assert_eq!(prompt.render(), assembler().render());
    }

    #[test]
    fn test_commentary_excludes_injected_code() {
        let mut prompt = assembler();
        prompt.push_feedback("n1", "Use setUp method");
        let commentary = prompt.commentary();
        assert!(commentary.contains("Write unit tests"));
        assert!(commentary.contains("Use setUp method"));
        assert!(!commentary.contains("class Greeter:"));
        assert!(!commentary.contains("    pass"));
        assert!(!commentary.contains("import unittest"));
    }

    #[test]
    fn test_plain_initial_excludes_enrichment() {
        let mut prompt = assembler();
        prompt.set_enrichment("Consider boundary values first");
        assert_eq!(
            prompt.plain_initial(),
            "Write unit tests for the class Greeter\nCover the edge cases"
        );
    }

    proptest! {
        // Layered-prompt reversibility: removing the most recently added
        // annotation restores the rendered text byte for byte.
        #[test]
        fn prop_remove_last_annotation_is_reversible(
            notes in prop::collection::vec(("[a-f0-9]{8}", "[ -~]{1,40}"), 1..6),
        ) {
            let mut prompt = assembler();
            for (index, (id, text)) in notes.iter().enumerate() {
                prompt.push_feedback(&format!("{id}{index}"), text);
            }
            let before = prompt.render();

            let last = format!("extra{}", notes.len());
            prompt.push_feedback(&last, "one more request");
            prompt.remove_annotation(&last);

            prop_assert_eq!(prompt.render(), before);
        }
    }
}
