//! In-character reply generation
//!
//! Builds a chat request from the selected character's system prompt and the
//! bounded conversation window, then asks a [`ChatModel`] for one utterance.

mod openai;

pub use openai::OpenAiChat;

use async_trait::async_trait;
use serde::Serialize;

use crate::character::Character;
use crate::history::{self, ConversationMessage, DEFAULT_HISTORY_LIMIT};
use crate::{Error, Result};

/// Sampling temperature for companion replies
pub const REPLY_TEMPERATURE: f32 = 1.0;

/// Index of the completion used when the model returns several candidates
pub const FIRST_CANDIDATE: usize = 0;

/// Role of a chat request entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<history::Role> for ChatRole {
    fn from(role: history::Role) -> Self {
        match role {
            history::Role::User => Self::User,
            history::Role::Assistant => Self::Assistant,
        }
    }
}

/// One role-tagged entry of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Ordered messages plus sampling temperature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Text-generation capability
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a chat completion and return every candidate's text in order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] on timeout, rate limiting, or malformed output
    async fn complete(&self, request: &ChatRequest) -> Result<Vec<String>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Box<T> {
    async fn complete(&self, request: &ChatRequest) -> Result<Vec<String>> {
        (**self).complete(request).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Produces one short in-character utterance per turn
pub struct ReplyGenerator<M> {
    model: M,
    history_limit: usize,
    temperature: f32,
}

impl<M: ChatModel> ReplyGenerator<M> {
    /// Create a generator with the default window and temperature
    pub fn new(model: M) -> Self {
        Self {
            model,
            history_limit: DEFAULT_HISTORY_LIMIT,
            temperature: REPLY_TEMPERATURE,
        }
    }

    /// Override the number of history messages sent per request
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Override the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the request for `history` spoken to `character`
    #[must_use]
    pub fn build_request(
        &self,
        history: &[ConversationMessage],
        character: &Character,
    ) -> ChatRequest {
        let window = history::bound(history, self.history_limit);

        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: character.system_prompt.clone(),
        });
        messages.extend(window.iter().map(|m| ChatMessage {
            role: m.role.into(),
            content: m.content.clone(),
        }));

        ChatRequest {
            messages,
            temperature: self.temperature,
        }
    }

    /// Generate the character's next line
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the model fails or returns no candidates.
    /// No retry is attempted.
    pub async fn generate(
        &self,
        history: &[ConversationMessage],
        character: &Character,
    ) -> Result<String> {
        let request = self.build_request(history, character);
        tracing::debug!(
            model = self.model.name(),
            character = %character.key,
            messages = request.messages.len(),
            "requesting reply"
        );

        let candidates = self.model.complete(&request).await?;
        let reply = candidates
            .into_iter()
            .nth(FIRST_CANDIDATE)
            .ok_or_else(|| Error::Generation("model returned no completions".to_string()))?;

        tracing::info!(character = %character.key, reply = %reply, "reply generated");
        Ok(reply)
    }
}
