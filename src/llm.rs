//! Classification service clients
//!
//! Provides the [`CompletionClient`] trait used by the query classifier and:
//! - OpenAiChatClient: any OpenAI-compatible chat completions endpoint
//! - ScriptedClient: canned replies for tests and offline demos
//!
//! ## Environment Variables
//!
//! - `OPENAI_API_KEY`: Required for OpenAiChatClient (name configurable)
//! - `OPENAI_BASE_URL`: API base URL (default: https://api.moonshot.cn/v1)

use crate::config::ClassifierConfig;
use crate::RouterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Default OpenAI-compatible base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";

/// Trait for request/response text completion services
///
/// Implementations must be thread-safe (Send + Sync); the router shares one
/// client across concurrent callers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, RouterError>;
}

// ============================================================================
// OpenAI-compatible chat client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (Moonshot, OpenAI, vLLM, ...)
///
/// ## Example
///
/// ```no_run
/// use tokio_query_router::OpenAiChatClient;
///
/// # fn example() -> Result<(), tokio_query_router::RouterError> {
/// let client = OpenAiChatClient::new("kimi-k2-0711-preview")?
///     .with_temperature(0.1)
///     .with_max_tokens(800);
/// # Ok(()) }
/// ```
pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatClient {
    /// Create a client reading `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ConfigError`] if the API key is not set.
    pub fn new(model: impl Into<String>) -> Result<Self, RouterError> {
        Self::with_key_env(model, "OPENAI_API_KEY")
    }

    /// Create a client reading the API key from a custom variable.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ConfigError`] if the variable is unset or empty.
    pub fn with_key_env(model: impl Into<String>, key_env: &str) -> Result<Self, RouterError> {
        let api_key = std::env::var(key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RouterError::ConfigError(format!("{key_env} not set")))?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: model.into(),
            temperature: 0.1,
            max_tokens: 800,
            timeout: Duration::from_secs(30),
        })
    }

    /// Build a client from the `[classifier]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ConfigError`] if the configured key variable is unset.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, RouterError> {
        let mut client = Self::with_key_env(config.model.clone(), &config.api_key_env)?
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(Duration::from_millis(config.timeout_ms));
        if let Some(url) = &config.base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(client)
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set maximum tokens to generate
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, RouterError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| RouterError::Classifier(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RouterError::Classifier(format!(
                "API error {status}: {error_text}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| RouterError::Classifier(format!("failed to parse response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| RouterError::Classifier("no choices in response".to_string()))
    }
}

// ============================================================================
// Scripted client
// ============================================================================

/// Client that replays canned replies in order.
///
/// Each call pops the next reply; once exhausted every call fails, which
/// drives the classifier onto its rule-based path.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedClient {
    /// Client with no scripted replies: every call fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Append a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Append a transport-style failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, item: Result<String, String>) {
        let mut guard = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        guard.push_back(item);
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _prompt: &str) -> Result<String, RouterError> {
        let next = {
            let mut guard = self.replies.lock().unwrap_or_else(|e| e.into_inner());
            guard.pop_front()
        };
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(RouterError::Classifier(message)),
            None => Err(RouterError::Classifier(
                "classification service unavailable".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_client_replays_in_order_then_fails() {
        let client = ScriptedClient::unavailable()
            .with_reply("first")
            .with_failure("boom");
        assert_eq!(client.complete("p").await.unwrap(), "first");
        assert!(matches!(
            client.complete("p").await,
            Err(RouterError::Classifier(m)) if m == "boom"
        ));
        assert!(client.complete("p").await.is_err());
    }

    #[test]
    fn test_with_key_env_missing_returns_config_error() {
        let result = OpenAiChatClient::with_key_env("m", "QUERY_ROUTER_TEST_UNSET_KEY_VAR");
        assert!(matches!(result, Err(RouterError::ConfigError(_))));
    }
}
