//! Per-user session state
//!
//! Each user interaction context owns one [`Session`], keyed by an opaque
//! [`SessionId`]. The store is shared by every request handler; sessions never
//! see each other's character or voice selection.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::character::CharacterRegistry;
use crate::Error;

/// Opaque session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh, collision-free token
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("malformed session token: {e}")))
    }
}

/// Selection state for one user context
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub selected_character: Option<String>,
    pub selected_voice_id: Option<String>,
    pub onboarding_seen: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            selected_character: None,
            selected_voice_id: None,
            onboarding_seen: false,
            created_at: now,
            last_seen: now,
        }
    }
}

/// Where a client should go next, derived from session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NextStep {
    /// Intro screen has not been shown yet
    Onboarding,
    /// No character chosen yet
    SelectCharacter,
    /// Ready to talk
    Ready {
        character: String,
        display_name: String,
    },
}

/// Shared, concurrency-safe session storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    default_voice_id: String,
}

impl SessionStore {
    /// Create an empty store; `default_voice_id` answers voice reads for
    /// sessions that never selected one
    pub fn new(default_voice_id: impl Into<String>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            default_voice_id: default_voice_id.into(),
        }
    }

    /// Voice used when a session has no selection
    #[must_use]
    pub fn default_voice_id(&self) -> &str {
        &self.default_voice_id
    }

    /// Record a character and voice selection. Always succeeds and marks
    /// onboarding as seen.
    ///
    /// An absent or blank field clears that part of the selection, so the
    /// session reads as unselected rather than selecting an empty key.
    pub async fn set_character(&self, id: SessionId, key: Option<&str>, voice_id: Option<&str>) {
        let key = non_blank(key);
        let voice_id = non_blank(voice_id);

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_insert_with(Session::new);
        session.selected_character.clone_from(&key);
        session.selected_voice_id.clone_from(&voice_id);
        session.onboarding_seen = true;
        session.last_seen = Utc::now();
        tracing::info!(
            session = %id,
            character = ?key,
            voice_id = ?voice_id,
            "character selected"
        );
    }

    /// Selected character key, if any
    pub async fn get_character(&self, id: SessionId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&id)
            .and_then(|s| s.selected_character.clone())
    }

    /// Selected voice, or the store default when none (or an empty one) was chosen
    pub async fn get_voice(&self, id: SessionId) -> String {
        self.sessions
            .read()
            .await
            .get(&id)
            .and_then(|s| s.selected_voice_id.clone())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.default_voice_id.clone())
    }

    /// Mark the intro screen as shown
    pub async fn mark_onboarding_seen(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_insert_with(Session::new);
        session.onboarding_seen = true;
        session.last_seen = Utc::now();
    }

    /// Refresh the idle timer, creating the session on first contact
    pub async fn touch(&self, id: SessionId) {
        self.sessions
            .write()
            .await
            .entry(id)
            .or_insert_with(Session::new)
            .last_seen = Utc::now();
    }

    /// Copy of the session state, if the session exists
    pub async fn snapshot(&self, id: SessionId) -> Option<Session> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Decide the client's next screen
    pub async fn next_step(&self, id: SessionId, registry: &CharacterRegistry) -> NextStep {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(&id) else {
            return NextStep::Onboarding;
        };

        if !session.onboarding_seen {
            return NextStep::Onboarding;
        }

        match &session.selected_character {
            None => NextStep::SelectCharacter,
            Some(key) => NextStep::Ready {
                character: key.clone(),
                display_name: registry.display_name(key).to_string(),
            },
        }
    }

    /// Drop sessions idle for longer than `ttl`, returning how many were removed
    pub async fn purge_idle(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen >= cutoff);
        let removed = before - sessions.len();

        if removed > 0 {
            tracing::debug!(removed, remaining = sessions.len(), "expired idle sessions");
        }
        removed
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
