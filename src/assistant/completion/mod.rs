
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::history::ChatTurn;
use crate::config::Config;
use crate::http::{HttpClient, endpoint};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Missing HUGGINGFACEHUB_API_TOKEN in environment.")]
    MissingToken,
    #[error("{0:#}")]
    Request(#[from] anyhow::Error),
    #[error("Response contained no answer")]
    EmptyResponse,
}

/// Body of a chat-completions request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// A model that turns a message list into a reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError>;
}

/// OpenAI-compatible chat-completions client for the hosted router
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Option<HttpClient>,
    url: Url,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base = config.inference.base_url()?;
        let url = endpoint(&base, "v1/chat/completions")
            .context("Failed to build chat completions URL")?;
        let http = config
            .inference
            .api_token
            .as_ref()
            .map(|token| HttpClient::new(token.clone(), &config.inference));

        Ok(Self { http, url })
    }

    /// Replace the transport. Has no effect on a client without credentials.
    #[inline]
    pub fn with_http_client(mut self, client: HttpClient) -> Self {
        if self.http.is_some() {
            self.http = Some(client);
        }
        self
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.http.is_some()
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let http = self.http.as_ref().ok_or(CompletionError::MissingToken)?;

        debug!(
            "Requesting completion from {} with {} messages",
            request.model,
            request.messages.len()
        );
        let response_text = http
            .post_json(&self.url, request)
            .context("Chat completion request failed")?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}
