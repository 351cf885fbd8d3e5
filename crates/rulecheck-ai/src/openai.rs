//! HTTP completion client for OpenAI-compatible chat-completions endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{CompletionClient, CompletionError};
use crate::prompt::Prompt;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Whole-request timeout: connect, send, and read the full body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat-completions client. Single attempt per call, no retries.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client for the given endpoint base URL and model, with
    /// [`DEFAULT_TIMEOUT`].
    ///
    /// `endpoint` should be like `https://api.openai.com/v1` (no trailing slash).
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        Self::with_timeout(endpoint, model, DEFAULT_TIMEOUT)
    }

    /// A call that has not finished within `timeout` fails with
    /// [`CompletionError::Http`].
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into();
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        }
    }
}

/// Turn an HTTP status and body into completion text.
///
/// A non-success status becomes [`CompletionError::Status`] carrying the
/// body, whatever it contains.
pub fn completion_from_response(status: StatusCode, body: String) -> Result<String, CompletionError> {
    if !status.is_success() {
        return Err(CompletionError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        });
    }
    parse_completion(&body)
}

/// Extract the first choice's message content from a chat-completions body.
pub fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::protocol("response contained no choices"))?
        .message
        .content
        .ok_or_else(|| CompletionError::protocol("first choice has no message content"))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        prompt: &Prompt,
        credential: &SecretString,
    ) -> Result<String, CompletionError> {
        let url = self.completions_url();
        info!(url = %url, model = %self.model, "requesting completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(credential.expose_secret())
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "completion request rejected");
        }

        let text = completion_from_response(status, body)?;
        info!(chars = text.len(), "completion received");
        Ok(text)
    }
}
