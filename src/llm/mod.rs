//! LLM client abstraction.
//!
//! Provides a unified interface for the two model roles in the pipeline
//! (router classification, response generation) across providers.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Role tag for a chat message sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// System instructions.
    System,
    /// User content.
    User,
    /// Assistant content (few-shot turns).
    Assistant,
}

impl ChatRole {
    /// Returns the wire form of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A role-tagged message for a provider call.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// The role.
    pub role: ChatRole,
    /// The content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Optional sampling parameters for a provider call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingParams {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token cap.
    pub max_tokens: Option<u32>,
}

/// Trait for LLM providers.
///
/// The pipeline treats providers as an opaque capability: send role-tagged
/// messages, get text back, or a failure. Callers degrade to canned
/// fallbacks on error; nothing retries here.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails (transport, non-200,
    /// malformed body, empty content).
    fn complete(&self, messages: &[ChatMessage], params: &SamplingParams) -> Result<String>;

    /// Generates a completion from a system + user prompt pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        params: &SamplingParams,
    ) -> Result<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        self.complete(&messages, params)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("EDUCHAT_LLM_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                self.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("EDUCHAT_LLM_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                self.connect_timeout_ms = connect_timeout_ms;
            }
        }
        self
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Constructs a provider from a config section.
#[must_use]
pub fn provider_from_config(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    let http = LlmHttpConfig::from_config(config).with_env_overrides();
    match config.provider {
        LlmProviderKind::OpenAi => {
            let mut client = OpenAiClient::new().with_http_config(http);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key);
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(client)
        }
        LlmProviderKind::Ollama => {
            let mut client = OllamaClient::new().with_http_config(http);
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(client)
        }
    }
}

/// Extracts JSON from an LLM response, handling markdown code fences.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks (without json marker)
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        // Skip language identifier if present (e.g., "json\n")
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle raw JSON (find first { to last })
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}
