//! OpenAI chat completions backend.
//!
//! async-openai is driven from synchronous callers through a private tokio
//! runtime; every call is bounded by the configured timeout.

use crate::completion::{Completion, Prompt, ResponseFormat};
use crate::config::CompletionConfig;
use crate::core::{Role, Turn};
use crate::error::{CompletionError, Error, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat as ApiResponseFormat,
};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// Completion backed by the OpenAI chat API.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    runtime: Runtime,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompletion {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without an API key, or a transport error if
    /// the runtime cannot start.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| Error::Config {
            message: "no API key configured. Set OPENAI_API_KEY or pass --offline".to_string(),
        })?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.base_url {
            openai_config = openai_config.with_api_base(base);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client: Client::with_config(openai_config),
            runtime,
            model: config.model.clone(),
            timeout: config.timeout,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_messages(prompt: &Prompt, history: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        let system = |content: &str| -> Result<ChatCompletionRequestMessage> {
            Ok(ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(api_error)?
                .into())
        };

        messages.push(system(&prompt.system)?);
        for note in &prompt.notes {
            messages.push(system(note)?);
        }

        for turn in history {
            let message: ChatCompletionRequestMessage = match turn.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(api_error)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(api_error)?
                    .into(),
            };
            messages.push(message);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()
                .map_err(api_error)?
                .into(),
        );

        Ok(messages)
    }
}

impl Completion for OpenAiCompletion {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, prompt: &Prompt, history: &[Turn]) -> Result<String> {
        let messages = Self::build_messages(prompt, history)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature);
        if prompt.format == ResponseFormat::Json {
            args.response_format(ApiResponseFormat::JsonObject);
        }
        let request = args.build().map_err(api_error)?;

        let seconds = self.timeout.as_secs();
        debug!(model = %self.model, history = history.len(), "sending completion request");

        let response = self
            .runtime
            .block_on(async {
                tokio::time::timeout(self.timeout, self.client.chat().create(request)).await
            })
            .map_err(|_| CompletionError::Timeout { seconds })?
            .map_err(api_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                CompletionError::EmptyResponse {
                    backend: "openai".to_string(),
                }
                .into()
            })
    }
}

fn api_error(err: OpenAIError) -> CompletionError {
    match err {
        OpenAIError::Reqwest(e) => CompletionError::Transport(e.to_string()),
        other => CompletionError::Api(other.to_string()),
    }
}
