//! Conversation history windowing

use serde::{Deserialize, Serialize};

/// Messages retained ahead of each generation call
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Last `limit` messages of `history`, in original order
#[must_use]
pub fn bound(history: &[ConversationMessage], limit: usize) -> &[ConversationMessage] {
    &history[history.len().saturating_sub(limit)..]
}
