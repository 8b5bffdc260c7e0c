//! Speech-to-text (STT) processing

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio payload to plain text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transcription`] if the capability is unreachable or
    /// returns malformed output
    async fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Response from `OpenAI` Whisper transcription API
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// `OpenAI` Whisper transcription
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    url: String,
}

impl WhisperTranscriber {
    /// Create a Whisper transcriber
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(client: reqwest::Client, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            model,
            url: WHISPER_URL.to_string(),
        })
    }

    /// Point the transcriber at a different endpoint (proxies, tests)
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// MIME type for an upload based on its extension
    fn mime_for(file_name: &str) -> &'static str {
        match Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("mp3") => "audio/mpeg",
            Some("webm") => "audio/webm",
            Some("ogg") => "audio/ogg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(file_name.to_string())
                    .mime_str(Self::mime_for(file_name))
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Transcription(format!("Whisper request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Transcription(format!("malformed Whisper response: {e}"))
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
