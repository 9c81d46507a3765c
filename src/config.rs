//! Runtime settings.
//!
//! Credentials and tunables are injected here by the CLI layer (flags with
//! environment fallbacks) and validated once, before any node is built.

use crate::error::{Error, Result};
use serde::Serialize;
use std::time::Duration;

/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default area rows are scoped to.
pub const DEFAULT_AREA: &str = "health";

/// How a multi-domain request consults its domains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One domain after another, in priority order.
    #[default]
    Sequential,
    /// All domains at once on the rayon pool; merged in priority order.
    Parallel,
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionConfig {
    /// API key. Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Optional API base URL override.
    pub base_url: Option<String>,
    /// Model name.
    pub model: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Reply token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Use the deterministic offline completion instead of a service.
    pub offline: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: 1500,
            temperature: 0.7,
            offline: false,
        }
    }
}

impl CompletionConfig {
    /// Offline settings, for tests and demos.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Returns the key when one is set and non-blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Memory capacities, in turns, per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryLimits {
    /// Director context.
    pub director: usize,
    /// Each domain manager's context.
    pub domain: usize,
    /// Each specialist's context.
    pub specialist: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            director: 20,
            domain: 15,
            specialist: 20,
        }
    }
}

/// Everything needed to assemble a hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Context capacities.
    pub memory: MemoryLimits,
    /// Area rows are scoped to.
    pub area: String,
    /// Multi-domain fan-out mode.
    pub fan_out: FanOut,
    /// Completion service.
    pub completion: CompletionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory: MemoryLimits::default(),
            area: DEFAULT_AREA.to_string(),
            fan_out: FanOut::default(),
            completion: CompletionConfig::default(),
        }
    }
}

impl Settings {
    /// Checks the settings before any node is built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero capacity, blank area or model,
    /// a zero timeout, or missing credentials when not offline.
    pub fn validate(&self) -> Result<()> {
        let config_err = |message: &str| {
            Err(Error::Config {
                message: message.to_string(),
            })
        };

        if self.memory.director == 0 || self.memory.domain == 0 || self.memory.specialist == 0 {
            return config_err("memory limits must be at least 1");
        }
        if self.area.trim().is_empty() {
            return config_err("area must not be empty");
        }
        if self.completion.model.trim().is_empty() {
            return config_err("model must not be empty");
        }
        if self.completion.timeout.is_zero() {
            return config_err("timeout must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return config_err("temperature must be between 0 and 2");
        }
        if !self.completion.offline && self.completion.api_key().is_none() {
            return config_err("no API key configured. Set OPENAI_API_KEY or pass --offline");
        }
        Ok(())
    }
}
