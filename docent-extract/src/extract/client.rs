//! Model-endpoint client: transport, retry, and response decoding.
//!
//! [`ChatBackend`] is the seam to the remote endpoint — one prompt in, one
//! reply string out. [`ExtractionClient`] layers the pipeline's reliability
//! policy on top: a fixed number of attempts with a fixed delay between them,
//! code-fence stripping, and tolerant JSON parsing. This is the only place in
//! the system allowed to surface a hard failure, and the orchestrator catches
//! it per work item one layer up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::json::parse_lenient;

const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Errors surfaced by a model extraction call.
///
/// Transport and endpoint failures are transient; malformed output is
/// indistinguishable from truncation at this layer. All variants are retried
/// identically until attempts are exhausted.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("model endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Endpoint { status: StatusCode, body: String },

    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// One round trip to a chat-completion endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// OpenAI-compatible chat-completions backend.
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpChatBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Endpoint { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ExtractError::MalformedOutput("response contained no choices".into()))
    }
}

/// Client layering retry, fence stripping, and lenient parsing over a backend.
pub struct ExtractionClient {
    backend: Arc<dyn ChatBackend>,
    retries: u32,
    delay: Duration,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_DELAY,
        }
    }

    /// Total number of attempts before the last error propagates. Clamped to
    /// at least one.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Fixed sleep between attempts. Intentionally not exponential: worst-case
    /// latency per item stays bounded under the admission cap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sends `prompt` and returns the parsed JSON reply.
    ///
    /// Any failure before the final attempt sleeps the configured delay and
    /// retries; the final attempt's error is returned to the caller.
    pub async fn extract(&self, prompt: &str) -> Result<Value, ExtractError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(prompt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("extraction attempt {attempt}/{} failed: {e}", self.retries);
                    if attempt >= self.retries {
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<Value, ExtractError> {
        let content = self.backend.complete(prompt).await?;
        let payload = strip_code_fence(&content);
        parse_lenient(&payload).map_err(|e| ExtractError::MalformedOutput(e.to_string()))
    }
}

/// Removes a surrounding code fence when the first and last lines are
/// triple-backtick markers; everything else passes through unchanged.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() >= 2 && trimmed.starts_with("```") && trimmed.ends_with("```") {
        lines[1..lines.len() - 1].join("\n")
    } else {
        text.to_string()
    }
}
