//! Deterministic completion used when no model is configured.

use crate::completion::{Completion, Prompt, ResponseFormat};
use crate::core::Turn;
use crate::error::Result;
use std::fmt::Write;

/// Answers without a language model.
///
/// Text prompts get the gathered context notes back verbatim, JSON prompts
/// get an empty object. Same input, same output.
///
/// # Examples
///
/// ```
/// use director_rs::completion::{Completion, OfflineCompletion, Prompt};
///
/// let offline = OfflineCompletion::new();
/// let reply = offline.complete(&Prompt::new("sys", "hi").json(), &[]).unwrap();
/// assert_eq!(reply, "{}");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCompletion;

impl OfflineCompletion {
    /// Creates the offline backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Completion for OfflineCompletion {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn complete(&self, prompt: &Prompt, _history: &[Turn]) -> Result<String> {
        if prompt.format == ResponseFormat::Json {
            return Ok("{}".to_string());
        }

        let mut reply = String::new();
        if prompt.notes.is_empty() {
            let _ = write!(
                reply,
                "No language model is configured, so I can't answer \"{}\" in detail.",
                prompt.user
            );
        } else {
            reply.push_str("No language model is configured. Here is what I found:\n");
            for note in &prompt.notes {
                let _ = write!(reply, "\n{}\n", note.trim_end());
            }
        }
        Ok(reply)
    }
}
