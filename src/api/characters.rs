//! Character and voice selection endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::character::Character;
use crate::session::{NextStep, SessionId};
use crate::voice::VoiceInfo;
use crate::Error;

/// Build selection router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/characters", get(list_characters))
        .route("/voices", get(list_voices))
        .route("/set-character", post(set_character))
        .route("/onboarding", post(complete_onboarding))
        .route("/session", get(session_state))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct CharacterListResponse {
    pub characters: Vec<Character>,
    pub default: String,
}

/// Selection form posted from the character screen; either field may be missing
#[derive(Debug, Deserialize)]
pub struct SetCharacterRequest {
    pub character_name: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub next: NextStep,
    pub voice_id: String,
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceListResponse {
    pub voices: Vec<VoiceInfo>,
}

async fn list_characters(State(state): State<Arc<ApiState>>) -> Json<CharacterListResponse> {
    let registry = state.pipeline.characters();
    Json(CharacterListResponse {
        characters: registry.iter().cloned().collect(),
        default: registry.default_character().key.clone(),
    })
}

async fn list_voices(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<VoiceListResponse>, ApiError> {
    let catalog = state
        .voices
        .as_ref()
        .ok_or_else(|| Error::Config("no synthesis provider configured".to_string()))?;

    let limit = state.catalog_timeout;
    let voices = tokio::time::timeout(limit, catalog.list_voices())
        .await
        .unwrap_or_else(|_| {
            tracing::error!(timeout_ms = limit.as_millis(), "voice catalogue timed out");
            Err(Error::Synthesis(format!(
                "voice listing timed out after {}ms",
                limit.as_millis()
            )))
        })?;
    Ok(Json(VoiceListResponse { voices }))
}

/// Store the selection; unknown characters fall back at reply time
async fn set_character(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<SessionId>,
    Form(request): Form<SetCharacterRequest>,
) -> Json<SuccessResponse> {
    state
        .pipeline
        .sessions()
        .set_character(
            session,
            request.character_name.as_deref(),
            request.voice_id.as_deref(),
        )
        .await;
    Json(SuccessResponse { success: true })
}

async fn complete_onboarding(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<SessionId>,
) -> Json<SuccessResponse> {
    state.pipeline.sessions().mark_onboarding_seen(session).await;
    Json(SuccessResponse { success: true })
}

async fn session_state(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<SessionId>,
) -> Json<SessionResponse> {
    let sessions = state.pipeline.sessions();
    let next = sessions
        .next_step(session, state.pipeline.characters())
        .await;
    Json(SessionResponse {
        next,
        voice_id: sessions.get_voice(session).await,
        voice_name: state.voice_name.clone(),
    })
}
