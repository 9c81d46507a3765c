//! Text completion.
//!
//! Every node reaches the language model through the [`Completion`] trait.
//! The OpenAI backend is compiled in with the `openai` feature; without a
//! model, [`OfflineCompletion`] answers deterministically.
//!
//! # Feature Flags
//!
//! - `openai`: Enables [`OpenAiCompletion`] (async-openai on a private tokio runtime)

pub mod extract;
mod offline;
#[cfg(feature = "openai")]
mod openai;
mod scripted;

pub use extract::{ExtractionSchema, FieldKind, FieldSpec, extract_fields, parse_fields};
pub use offline::OfflineCompletion;
#[cfg(feature = "openai")]
pub use openai::OpenAiCompletion;
pub use scripted::ScriptedCompletion;

use crate::config::CompletionConfig;
use crate::core::Turn;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::warn;

/// Shape the reply must take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free text.
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

/// One completion request, minus conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    /// System instructions.
    pub system: String,
    /// Extra system-level context (store reads, insights, time).
    pub notes: Vec<String>,
    /// The user message.
    pub user: String,
    /// Reply shape.
    pub format: ResponseFormat,
}

impl Prompt {
    /// A text prompt.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            notes: Vec::new(),
            user: user.into(),
            format: ResponseFormat::Text,
        }
    }

    /// Appends a context note; blank notes are skipped.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        if !note.trim().is_empty() {
            self.notes.push(note);
        }
        self
    }

    /// Requests a JSON object reply.
    #[must_use]
    pub const fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }
}

/// Trait for completion backends.
///
/// Implementations must be thread-safe so domains can be consulted in
/// parallel.
pub trait Completion: Send + Sync {
    /// Backend name, for logs and status output.
    fn name(&self) -> &str;

    /// Produces a reply to `prompt` given the caller's conversation history.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::CompletionError`] on timeout, transport,
    /// or service failure.
    fn complete(&self, prompt: &Prompt, history: &[Turn]) -> Result<String>;
}

/// Shared handle to a completion backend.
pub type SharedCompletion = Arc<dyn Completion>;

/// Retries a retryable failure exactly once.
pub struct RetryOnce {
    inner: SharedCompletion,
}

impl RetryOnce {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: SharedCompletion) -> Self {
        Self { inner }
    }
}

impl Completion for RetryOnce {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn complete(&self, prompt: &Prompt, history: &[Turn]) -> Result<String> {
        match self.inner.complete(prompt, history) {
            Err(Error::Completion(e)) if e.is_retryable() => {
                warn!(backend = self.inner.name(), error = %e, "completion failed, retrying once");
                self.inner.complete(prompt, history)
            }
            other => other,
        }
    }
}

/// Creates the completion backend described by `config`.
///
/// - `offline`: Returns [`OfflineCompletion`]
/// - With the `openai` feature: Returns [`OpenAiCompletion`] wrapped in [`RetryOnce`]
///
/// # Errors
///
/// Returns [`Error::Config`] when no API key is set and offline mode is off,
/// or when the `openai` feature is not compiled in.
pub fn create_completion(config: &CompletionConfig) -> Result<SharedCompletion> {
    if config.offline {
        return Ok(Arc::new(OfflineCompletion::new()));
    }
    online_completion(config)
}

#[cfg(feature = "openai")]
fn online_completion(config: &CompletionConfig) -> Result<SharedCompletion> {
    let backend: SharedCompletion = Arc::new(OpenAiCompletion::new(config)?);
    Ok(Arc::new(RetryOnce::new(backend)))
}

#[cfg(not(feature = "openai"))]
fn online_completion(_config: &CompletionConfig) -> Result<SharedCompletion> {
    Err(Error::Config {
        message: "built without the `openai` feature; pass --offline".to_string(),
    })
}
