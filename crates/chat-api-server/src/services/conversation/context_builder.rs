use tracing::debug;

use crate::config::MemoryMode;

use super::transcript::{render_transcript, Transcript};
use super::types::{Role, Turn};

pub const SUMMARY_LABEL: &str = "Summary: ";
pub const SUMMARY_ELLIPSIS: &str = "...";
pub const DEFAULT_SUMMARY_BUDGET: usize = 200;

/// Length-bounded excerpt of the rendered transcript.
///
/// No semantic compression: the first `char_budget` characters of the
/// rendering, prefixed with [`SUMMARY_LABEL`] and followed by
/// [`SUMMARY_ELLIPSIS`].
pub fn summarize(turns: &[Turn], char_budget: usize) -> String {
    let rendered = render_transcript(turns);
    let excerpt: String = rendered.chars().take(char_budget).collect();
    format!("{}{}{}", SUMMARY_LABEL, excerpt, SUMMARY_ELLIPSIS)
}

/// Builds the prompt sent to the model from prior turns and the new message.
pub struct ContextBuilder {
    memory: MemoryMode,
    summary_char_budget: usize,
}

impl ContextBuilder {
    pub fn new(memory: MemoryMode, summary_char_budget: usize) -> Self {
        Self {
            memory,
            summary_char_budget,
        }
    }

    pub fn summarize(&self, transcript: &Transcript) -> String {
        summarize(transcript.turns(), self.summary_char_budget)
    }

    /// `<memory>\nHuman: <message>\nAI:`; the memory part depends on [`MemoryMode`]
    /// and is omitted when there is no prior turn.
    pub fn build_prompt(&self, history: &Transcript, message: &str) -> String {
        let current = format!("{}: {}\n{}:", Role::Human.label(), message, Role::Assistant.label());

        if history.is_empty() {
            return current;
        }

        let memory = match self.memory {
            MemoryMode::Buffer => history.render(),
            MemoryMode::Summary => self.summarize(history),
            MemoryMode::None => return current,
        };

        debug!(
            "Prompt memory: mode={:?}, turns={}, chars={}",
            self.memory,
            history.len(),
            memory.len()
        );

        format!("{}\n{}", memory, current)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(MemoryMode::Buffer, DEFAULT_SUMMARY_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(pairs: &[(Role, &str)]) -> Transcript {
        let mut transcript = Transcript::new();
        let now = Utc::now();
        for (role, content) in pairs {
            transcript.push(*role, *content, now);
        }
        transcript
    }

    #[test]
    fn test_summary_of_empty_transcript() {
        assert_eq!(summarize(&[], 200), "Summary: ...");
    }

    #[test]
    fn test_summary_short_transcript_kept_whole() {
        let t = history(&[(Role::Human, "hi"), (Role::Assistant, "hello")]);
        assert_eq!(summarize(t.turns(), 200), "Summary: Human: hi\nAI: hello...");
    }

    #[test]
    fn test_summary_is_bounded_prefix() {
        let long = "x".repeat(500);
        let t = history(&[(Role::Human, long.as_str()), (Role::Assistant, "ok")]);
        let rendered = t.render();

        let summary = summarize(t.turns(), 200);

        assert!(summary.chars().count() <= SUMMARY_LABEL.len() + 200 + SUMMARY_ELLIPSIS.len());
        let excerpt = summary
            .strip_prefix(SUMMARY_LABEL)
            .and_then(|s| s.strip_suffix(SUMMARY_ELLIPSIS))
            .unwrap();
        assert_eq!(excerpt.chars().count(), 200);
        assert!(rendered.starts_with(excerpt));
    }

    #[test]
    fn test_summary_never_splits_multibyte_chars() {
        let t = history(&[(Role::Human, "héllo wörld ✓✓✓")]);
        let summary = summarize(t.turns(), 10);
        assert_eq!(summary, "Summary: Human: hél...");
    }

    #[test]
    fn test_summary_is_idempotent() {
        let t = history(&[(Role::Human, "a"), (Role::Assistant, "b")]);
        let builder = ContextBuilder::default();
        assert_eq!(builder.summarize(&t), builder.summarize(&t));
    }

    #[test]
    fn test_prompt_without_history() {
        let builder = ContextBuilder::default();
        assert_eq!(builder.build_prompt(&Transcript::new(), "hi"), "Human: hi\nAI:");
    }

    #[test]
    fn test_prompt_buffer_memory() {
        let t = history(&[(Role::Human, "hi"), (Role::Assistant, "hello")]);
        let builder = ContextBuilder::new(MemoryMode::Buffer, 200);
        assert_eq!(
            builder.build_prompt(&t, "how are you?"),
            "Human: hi\nAI: hello\nHuman: how are you?\nAI:"
        );
    }

    #[test]
    fn test_prompt_summary_memory() {
        let t = history(&[(Role::Human, "hi"), (Role::Assistant, "hello")]);
        let builder = ContextBuilder::new(MemoryMode::Summary, 5);
        assert_eq!(
            builder.build_prompt(&t, "and?"),
            "Summary: Human...\nHuman: and?\nAI:"
        );
    }

    #[test]
    fn test_prompt_no_memory() {
        let t = history(&[(Role::Human, "hi")]);
        let builder = ContextBuilder::new(MemoryMode::None, 200);
        assert_eq!(builder.build_prompt(&t, "again"), "Human: again\nAI:");
    }
}
