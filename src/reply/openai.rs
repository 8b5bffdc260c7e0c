//! `OpenAI` chat completions backend

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, ChatRequest, FIRST_CANDIDATE};
use crate::{Error, Result};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// `OpenAI` chat completion model
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    url: String,
}

impl OpenAiChat {
    /// Create a chat backend for `model`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(client: reqwest::Client, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            model,
            url: CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    /// Point the backend at a different endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
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

/// Candidate texts of a completion response, in choice order
///
/// Only the candidate that is actually spoken must carry text; other choices
/// without content (tool calls, refusals) read as empty.
fn candidates(response: CompletionResponse) -> Result<Vec<String>> {
    response
        .choices
        .into_iter()
        .enumerate()
        .map(|(index, choice)| match choice.message.content {
            Some(text) => Ok(text),
            None if index == FIRST_CANDIDATE => Err(Error::Generation(
                "completion choice has no content".to_string(),
            )),
            None => Ok(String::new()),
        })
        .collect()
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<Vec<String>> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                Error::Generation(format!("OpenAI request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI API error");
            return Err(Error::Generation(format!(
                "OpenAI API error {status}: {body}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("failed to parse OpenAI response: {e}")))?;

        candidates(parsed)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
