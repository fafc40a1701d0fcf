// Chat-completion client for OpenAI-compatible endpoints.
//
// One POST per call to `{base_url}/chat/completions` with bearer auth. No
// streaming and no retries; every failure is surfaced as a `GatewayError`
// and the caller decides whether to resubmit the same turn.

use std::time::Duration;

use async_trait::async_trait;
use copilot_core::config::Config;
use copilot_core::review::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const COMPLETIONS_PATH: &str = "/chat/completions";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Missing credentials or an unusable client setup. Not retryable.
    #[error("LLM not configured: {0}")]
    Configuration(String),

    /// The endpoint answered with a non-success status.
    #[error("LLM API returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Network failure or timeout before a response arrived.
    #[error("LLM request failed: {0}")]
    Transport(String),

    /// The response body could not be used (undecodable, empty, or not
    /// the expected shape).
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Stable category name used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Configuration(_) => "configuration",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::Transport(_) => "transport",
            GatewayError::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Whether resubmitting the same turn may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GatewayError::Configuration(_))
    }
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Anything that can turn an ordered message list into the model's reply to
/// the final user turn.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, GatewayError>;
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Low-level chat-completion client.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: completions_url(base_url),
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatGateway for ChatClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!(endpoint = %self.endpoint, messages = messages.len(), "sending chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            warn!(status = status.as_u16(), "chat completion rejected");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        parse_completion(&text)
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured client or a disabled stand-in that fails every call
/// with a configuration error.
pub enum LlmClient {
    Active(ChatClient),
    Disabled { reason: String },
}

impl LlmClient {
    /// `Active` when both an API key and a model id are configured,
    /// otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        let api_key = config.credentials.api_key.clone().filter(|k| !k.is_empty());
        let model = config.llm.model.clone().filter(|m| !m.is_empty());

        let (api_key, model) = match (api_key, model) {
            (Some(key), Some(model)) => (key, model),
            (None, _) => {
                return LlmClient::Disabled {
                    reason: "API key missing (credentials.toml or COPILOT_API_KEY)".into(),
                }
            }
            (_, None) => {
                return LlmClient::Disabled {
                    reason: "llm.model is not set in copilot.toml".into(),
                }
            }
        };

        match ChatClient::new(
            &config.llm.base_url,
            api_key,
            model,
            config.llm.temperature,
            config.llm.max_tokens,
            Duration::from_secs(config.llm.timeout_secs),
        ) {
            Ok(client) => LlmClient::Active(client),
            Err(GatewayError::Configuration(reason)) => LlmClient::Disabled { reason },
            Err(other) => LlmClient::Disabled {
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl ChatGateway for LlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, GatewayError> {
        match self {
            LlmClient::Active(client) => client.complete(messages).await,
            LlmClient::Disabled { reason } => Err(GatewayError::Configuration(reason.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn completions_url(base_url: &str) -> String {
    format!("{}{COMPLETIONS_PATH}", base_url.trim_end_matches('/'))
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Transport(format!("request timed out: {err}"))
    } else {
        GatewayError::Transport(format!("network error: {err}"))
    }
}

/// Extract `choices[0].message.content` from a completion body.
///
/// Expected shape: `{ "choices": [ { "message": { "content": "..." } } ] }`
pub(crate) fn parse_completion(body: &str) -> Result<String, GatewayError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("undecodable completion body: {e}")))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(GatewayError::MalformedResponse("empty completion".into()));
    }
    Ok(content)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
