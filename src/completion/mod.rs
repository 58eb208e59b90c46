//! Chat-completion adapters used by every prompt stage.
//!
//! Callers hand over a [`CompletionRequest`] naming a [`PromptTemplate`]; the adapters render it
//! into a system and a user message and issue a single non-streaming chat call. Transport
//! failures, `429` and `5xx` responses are retried with exponential backoff, up to the configured
//! retry budget.

mod prompts;

pub use prompts::{CompletionRequest, PromptTemplate, RenderedPrompt};

use crate::config::{CompletionProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// A template variable was not supplied.
    #[error("prompt template '{template}' is missing variable '{variable}'")]
    MissingVariable {
        /// Template identifier.
        template: &'static str,
        /// Name of the absent variable.
        variable: &'static str,
    },
    /// Provider could not be reached.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Render `request` and return the model's text output.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Bounded exponential backoff applied to retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy with the given retry budget and a 500ms base delay.
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(retry))
    }

    async fn run<F, Fut>(&self, template: &'static str, mut attempt: F) -> Result<String, CompletionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, Attempt>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Ok(text) => return Ok(text),
                Err(Attempt::Retryable(error)) if retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    retry += 1;
                    tracing::warn!(
                        template,
                        retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Completion attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Attempt::Retryable(error) | Attempt::Fatal(error)) => return Err(error),
            }
        }
    }
}

/// Outcome of a single failed HTTP attempt.
enum Attempt {
    Retryable(CompletionError),
    Fatal(CompletionError),
}

async fn send(request: RequestBuilder, provider: &str) -> Result<reqwest::Response, Attempt> {
    let response = request.send().await.map_err(|error| {
        Attempt::Retryable(CompletionError::ProviderUnavailable(format!(
            "failed to reach {provider}: {error}"
        )))
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = CompletionError::GenerationFailed(format!("{provider} returned {status}: {body}"));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(Attempt::Retryable(error))
    } else {
        Err(Attempt::Fatal(error))
    }
}

fn messages(prompt: &RenderedPrompt) -> Value {
    json!([
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
    ])
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionClient {
    fn new(
        http: Client,
        base_url: String,
        api_key: Option<String>,
        model: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
            retry,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, payload: &Value) -> Result<String, Attempt> {
        let mut request = self.http.post(self.endpoint()).json(payload);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = send(request, "completion endpoint").await?;
        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            Attempt::Fatal(CompletionError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            )))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                Attempt::Fatal(CompletionError::InvalidResponse(
                    "chat completion contained no message content".into(),
                ))
            })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let prompt = request.render()?;
        let payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": messages(&prompt),
        });

        self.retry
            .run(request.template.id(), || self.attempt(&payload))
            .await
    }
}

/// Client for the Ollama `/api/chat` endpoint.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaCompletionClient {
    fn new(http: Client, base_url: String, model: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url,
            model,
            retry,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, payload: &Value) -> Result<String, Attempt> {
        let request = self.http.post(self.endpoint()).json(payload);
        let response = send(request, "Ollama").await?;
        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            Attempt::Fatal(CompletionError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            )))
        })?;

        if !body.done {
            return Err(Attempt::Fatal(CompletionError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            )));
        }

        Ok(body.message.content.trim().to_string())
    }
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let prompt = request.render()?;
        let payload = json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": 0 },
            "messages": messages(&prompt),
        });

        self.retry
            .run(request.template.id(), || self.attempt(&payload))
            .await
    }
}

/// Build a completion client for the configured provider.
pub fn build_completion_client(
    config: &Config,
) -> Result<Box<dyn CompletionClient>, CompletionError> {
    tracing::debug!(
        provider = ?config.completion_provider,
        model = %config.completion_model,
        max_retries = config.completion_max_retries,
        "Building completion client"
    );

    let http = Client::builder()
        .user_agent("doclens/completion")
        .timeout(Duration::from_secs(config.completion_timeout_secs))
        .build()
        .map_err(|error| CompletionError::ProviderUnavailable(error.to_string()))?;
    let retry = RetryPolicy::new(config.completion_max_retries);

    Ok(match config.completion_provider {
        CompletionProvider::OpenAI => Box::new(OpenAiCompletionClient::new(
            http,
            config
                .completion_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            config.completion_api_key.clone(),
            config.completion_model.clone(),
            retry,
        )),
        CompletionProvider::Ollama => Box::new(OllamaCompletionClient::new(
            http,
            config
                .completion_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            config.completion_model.clone(),
            retry,
        )),
    })
}
