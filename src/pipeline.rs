//! Conversation turn pipeline
//!
//! One turn runs transcribe → contextualize → generate → synthesize → expose.
//! Each capability call is bounded by a per-stage timeout, and a failing stage
//! aborts the turn before any later stage is attempted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::character::CharacterRegistry;
use crate::error::Stage;
use crate::history::ConversationMessage;
use crate::reply::{ChatModel, ReplyGenerator};
use crate::scratch::ScratchFiles;
use crate::session::{SessionId, SessionStore};
use crate::voice::{Synthesizer, Transcriber, VoiceSettings};
use crate::{Error, Result};

/// Upper bound on each external capability call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub transcribe: Duration,
    pub generate: Duration,
    pub synthesize: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            transcribe: Duration::from_secs(30),
            generate: Duration::from_secs(60),
            synthesize: Duration::from_secs(60),
        }
    }
}

/// Text and audio produced by a successful turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    /// The character's line
    pub text: String,
    /// Opaque file name of the synthesized audio in the outputs area
    pub audio_file: String,
}

/// Result of a full audio-in, audio-out turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub transcript: String,
    pub reply: TurnReply,
}

/// Runs conversation turns against pluggable capabilities
pub struct TurnPipeline {
    characters: CharacterRegistry,
    sessions: SessionStore,
    transcriber: Arc<dyn Transcriber>,
    generator: ReplyGenerator<Box<dyn ChatModel>>,
    synthesizer: Arc<dyn Synthesizer>,
    files: ScratchFiles,
    timeouts: StageTimeouts,
}

impl TurnPipeline {
    /// Assemble a pipeline with default timeouts and history window
    pub fn new(
        characters: CharacterRegistry,
        sessions: SessionStore,
        transcriber: Arc<dyn Transcriber>,
        chat: Box<dyn ChatModel>,
        synthesizer: Arc<dyn Synthesizer>,
        files: ScratchFiles,
    ) -> Self {
        Self {
            characters,
            sessions,
            transcriber,
            generator: ReplyGenerator::new(chat),
            synthesizer,
            files,
            timeouts: StageTimeouts::default(),
        }
    }

    /// Override per-stage timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override how many history messages reach the model
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.generator = self.generator.with_history_limit(limit);
        self
    }

    /// Override the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generator = self.generator.with_temperature(temperature);
        self
    }

    #[must_use]
    pub const fn characters(&self) -> &CharacterRegistry {
        &self.characters
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub const fn files(&self) -> &ScratchFiles {
        &self.files
    }

    /// Persist an uploaded recording, transcribe it, and delete it
    ///
    /// The upload is removed whether or not transcription succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileIo`] if the upload cannot be stored and
    /// [`Error::Transcription`] if the capability fails or times out
    pub async fn transcribe_upload(&self, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::InvalidInput("empty audio upload".to_string()));
        }

        let path = self.files.save_upload(audio).await?;
        let result = self.transcribe_file(&path).await;
        self.files.delete(&path).await;
        result
    }

    async fn transcribe_file(&self, path: &std::path::Path) -> Result<String> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| Error::file_io(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("audio.wav");

        bounded(
            Stage::Transcription,
            self.timeouts.transcribe,
            self.transcriber.transcribe(&audio, file_name),
        )
        .await
    }

    /// Generate and voice the selected character's reply to `history`
    ///
    /// Previous outputs are purged right before the new one is written. If
    /// synthesis fails the text reply is withheld and nothing is exposed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`], [`Error::Synthesis`], or [`Error::FileIo`]
    /// naming the stage that failed
    pub async fn reply(
        &self,
        session: SessionId,
        history: &[ConversationMessage],
    ) -> Result<TurnReply> {
        let selected = self.sessions.get_character(session).await;
        let character = selected.as_deref().map_or_else(
            || self.characters.default_character(),
            |key| self.characters.lookup(key),
        );

        let text = bounded(
            Stage::Generation,
            self.timeouts.generate,
            self.generator.generate(history, character),
        )
        .await?;

        let voice_id = self.sessions.get_voice(session).await;
        let audio = bounded(
            Stage::Synthesis,
            self.timeouts.synthesize,
            self.synthesizer
                .synthesize(&text, &voice_id, VoiceSettings::COMPANION),
        )
        .await?;

        self.files.purge_outputs().await;
        let path = self.files.save_output(&audio).await?;
        let audio_file = path
            .file_name()
            .and_then(|f| f.to_str())
            .map(ToString::to_string)
            .ok_or_else(|| Error::file_io(&path, std::io::Error::other("unnamed output")))?;

        tracing::info!(
            session = %session,
            character = %character.key,
            voice_id = %voice_id,
            audio_file = %audio_file,
            "turn complete"
        );

        Ok(TurnReply { text, audio_file })
    }

    /// Full turn: transcribe `audio`, append it to `history`, reply
    ///
    /// # Errors
    ///
    /// Any stage error; a transcription failure aborts before generation
    pub async fn turn(
        &self,
        session: SessionId,
        audio: &[u8],
        history: &[ConversationMessage],
    ) -> Result<TurnOutcome> {
        let transcript = self.transcribe_upload(audio).await?;

        let mut conversation = history.to_vec();
        conversation.push(ConversationMessage::user(transcript.clone()));

        let reply = self.reply(session, &conversation).await?;
        Ok(TurnOutcome { transcript, reply })
    }
}

/// Run `fut` with a deadline, reporting expiry as the stage's error
async fn bounded<T>(
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(stage_error(
            stage,
            format!("timed out after {}ms", limit.as_millis()),
        ))
    });

    if let Err(e) = &result {
        tracing::error!(stage = stage.as_str(), error = %e, "turn stage failed");
    }
    result
}

fn stage_error(stage: Stage, message: String) -> Error {
    match stage {
        Stage::Transcription => Error::Transcription(message),
        Stage::Generation => Error::Generation(message),
        Stage::Synthesis => Error::Synthesis(message),
        Stage::FileIo => Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let ok = bounded(Stage::Generation, Duration::from_secs(1), async { Ok(5) }).await;
        assert_eq!(ok.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_bounded_timeout_maps_to_stage() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        };
        let result = bounded(Stage::Synthesis, Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(Error::Synthesis(_))));
    }

    #[test]
    fn test_default_timeouts_are_finite() {
        let timeouts = StageTimeouts::default();
        assert!(timeouts.transcribe > Duration::ZERO);
        assert!(timeouts.generate >= timeouts.transcribe);
    }
}
