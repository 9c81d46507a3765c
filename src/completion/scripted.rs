//! Scripted completion for tests and benchmarks.

use crate::completion::{Completion, Prompt};
use crate::core::Turn;
use crate::error::{CompletionError, Result, StorageError};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Replays canned replies and records every prompt it receives.
///
/// Resolution order for each call:
/// 1. The first rule whose needle occurs in the system prompt or user text
/// 2. The next queued reply or error
/// 3. The default reply, if set
/// 4. [`CompletionError::Exhausted`]
///
/// # Examples
///
/// ```
/// use director_rs::completion::{Completion, Prompt, ScriptedCompletion};
///
/// let scripted = ScriptedCompletion::new().with_default("ok");
/// scripted.push_reply("first");
/// assert_eq!(scripted.complete(&Prompt::new("s", "u"), &[]).unwrap(), "first");
/// assert_eq!(scripted.complete(&Prompt::new("s", "u"), &[]).unwrap(), "ok");
/// assert_eq!(scripted.calls(), 2);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    rules: Mutex<Vec<(String, String)>>,
    queue: Mutex<VecDeque<std::result::Result<String, CompletionError>>>,
    default_reply: Option<String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedCompletion {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply used once rules and queue are exhausted.
    #[must_use]
    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Answers `reply` whenever `needle` occurs in the prompt.
    pub fn on(&self, needle: impl Into<String>, reply: impl Into<String>) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push((needle.into(), reply.into()));
        }
    }

    /// Queues a reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(Ok(reply.into()));
        }
    }

    /// Queues a failure.
    pub fn push_error(&self, error: CompletionError) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.prompts.lock().map_or(0, |p| p.len())
    }

    /// Every prompt received, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|_| StorageError::Transaction("script lock poisoned".to_string()).into())
    }
}

impl Completion for ScriptedCompletion {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, prompt: &Prompt, _history: &[Turn]) -> Result<String> {
        Self::guard(&self.prompts)?.push(prompt.clone());

        let rule = Self::guard(&self.rules)?
            .iter()
            .find(|(needle, _)| prompt.system.contains(needle) || prompt.user.contains(needle))
            .map(|(_, reply)| reply.clone());
        if let Some(reply) = rule {
            return Ok(reply);
        }

        if let Some(next) = Self::guard(&self.queue)?.pop_front() {
            return next.map_err(Into::into);
        }

        self.default_reply
            .clone()
            .ok_or_else(|| CompletionError::Exhausted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_take_precedence() {
        let scripted = ScriptedCompletion::new().with_default("default");
        scripted.on("EXTRACT", "{\"a\": 1}");
        scripted.push_reply("queued");

        let extract = Prompt::new("EXTRACT fields", "x");
        assert_eq!(scripted.complete(&extract, &[]).unwrap(), "{\"a\": 1}");
        assert_eq!(
            scripted.complete(&Prompt::new("chat", "x"), &[]).unwrap(),
            "queued"
        );
        assert_eq!(
            scripted.complete(&Prompt::new("chat", "x"), &[]).unwrap(),
            "default"
        );
    }

    #[test]
    fn test_exhausted() {
        let scripted = ScriptedCompletion::new();
        let err = scripted.complete(&Prompt::new("s", "u"), &[]).unwrap_err();
        assert!(err.to_string().contains("no scripted reply"));
    }

    #[test]
    fn test_records_prompts() {
        let scripted = ScriptedCompletion::new().with_default("ok");
        scripted.complete(&Prompt::new("s", "first"), &[]).unwrap();
        scripted.complete(&Prompt::new("s", "second"), &[]).unwrap();
        let users: Vec<_> = scripted.prompts().into_iter().map(|p| p.user).collect();
        assert_eq!(users, vec!["first", "second"]);
    }
}
