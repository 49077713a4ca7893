//! LLM client: the single point of entry for text generation calls.
//!
//! Every section's narrative text comes through the `TextGenerator` trait so
//! the composition pipeline can be driven by a mock in tests. `LlmClient`
//! makes exactly one HTTP attempt per call; the retry and placeholder policy
//! lives with the caller in `generation::fetch`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod extract;

pub use extract::{extract_text, ExtractionRule, EXTRACTION_RULES};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all section text.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("generation returned empty content")]
    EmptyContent,

    #[error("unrecognised response shape")]
    UnrecognisedShape,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Reads `usage` in either the messages (`input_tokens`) or chat (`prompt_tokens`) naming.
    pub fn from_body(body: &Value) -> Option<Self> {
        let usage = body.get("usage")?;
        let field = |a: &str, b: &str| {
            usage
                .get(a)
                .or_else(|| usage.get(b))
                .and_then(Value::as_u64)
        };
        Some(Self {
            input_tokens: field("input_tokens", "prompt_tokens")?,
            output_tokens: field("output_tokens", "completion_tokens").unwrap_or(0),
        })
    }
}

/// Successful generation result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Anything that can turn a prompt into narrative text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedText, GenerationError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Text generator backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            endpoint: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Points the client at a different messages endpoint (proxies, local mocks).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedText, GenerationError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw = response.text().await?;
        let body: Value = serde_json::from_str(&raw)?;
        let usage = TokenUsage::from_body(&body);
        let text = extract_text(&body)?;

        debug!(
            chars = text.len(),
            input_tokens = usage.map(|u| u.input_tokens),
            output_tokens = usage.map(|u| u.output_tokens),
            "generation call succeeded"
        );

        Ok(GeneratedText { text, usage })
    }
}
