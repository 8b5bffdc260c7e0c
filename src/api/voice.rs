//! Turn endpoints: transcription, reply generation, and audio playback

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{rate_limit, ApiError, ApiState};
use crate::history::ConversationMessage;
use crate::session::SessionId;

/// Build turn router
pub fn router(state: Arc<ApiState>) -> Router {
    let limited = Router::new()
        .route("/transcribe", post(transcribe))
        .route("/ask", post(ask))
        .route("/turn", post(turn))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_turns,
        ));

    Router::new()
        .merge(limited)
        .route("/listen/{filename}", get(listen))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Reply request: the caller owns and sends the full conversation
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub conversation: Vec<ConversationMessage>,
}

/// Reply response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub text: String,
    /// URL the reply audio can be fetched from
    pub audio: String,
}

/// Full turn response
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub transcript: String,
    pub text: String,
    pub audio: String,
}

fn listen_url(audio_file: &str) -> String {
    format!("/listen/{audio_file}")
}

/// Multipart fields a turn upload may carry
struct Upload {
    audio: Option<Bytes>,
    conversation: Vec<ConversationMessage>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload {
        audio: None,
        conversation: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed upload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read audio: {e}")))?;
                upload.audio = Some(bytes);
            }
            Some("conversation") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| {
                        ApiError::BadRequest(format!("failed to read conversation: {e}"))
                    })?;
                upload.conversation = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("invalid conversation: {e}")))?;
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Transcribe an uploaded recording (multipart field `file`)
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let audio = read_upload(multipart)
        .await?
        .audio
        .ok_or_else(|| ApiError::BadRequest("No file found".to_string()))?;

    let text = state.pipeline.transcribe_upload(&audio).await?;
    Ok(Json(TranscribeResponse { text }))
}

/// Generate and voice the selected character's reply
async fn ask(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let reply = state.pipeline.reply(session, &request.conversation).await?;
    Ok(Json(AskResponse {
        text: reply.text,
        audio: listen_url(&reply.audio_file),
    }))
}

/// Audio in, audio out in one request
async fn turn(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<SessionId>,
    multipart: Multipart,
) -> Result<Json<TurnResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let audio = upload
        .audio
        .ok_or_else(|| ApiError::BadRequest("No file found".to_string()))?;

    let outcome = state
        .pipeline
        .turn(session, &audio, &upload.conversation)
        .await?;

    Ok(Json(TurnResponse {
        transcript: outcome.transcript,
        text: outcome.reply.text,
        audio: listen_url(&outcome.reply.audio_file),
    }))
}

/// Serve a generated reply by its opaque name
async fn listen(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let audio = state.pipeline.files().read_output(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
