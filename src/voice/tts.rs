//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Voice tuning sent with every synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    #[serde(rename = "similarity_boost")]
    pub similarity: f64,
}

impl VoiceSettings {
    /// Expressive but recognizable character voices
    pub const COMPANION: Self = Self {
        stability: 0.30,
        similarity: 0.75,
    };
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::COMPANION
    }
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// # Returns
    ///
    /// Raw audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] if the capability fails
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: VoiceSettings,
    ) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Source of selectable voices
#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    /// Voices available to this account
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] if the provider cannot be queried
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>>;
}

/// A voice offered by the synthesis provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceInfo>,
}

/// `ElevenLabs` speech synthesis
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    /// Create an `ElevenLabs` synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(client: reqwest::Client, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            model,
            base_url: ELEVENLABS_BASE_URL.to_string(),
        })
    }

    /// Point the synthesizer at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl VoiceCatalog for ElevenLabsSynthesizer {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("ElevenLabs voices request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "ElevenLabs voices error {status}: {body}"
            )));
        }

        let voices: VoicesResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("malformed voices response: {e}")))?;
        Ok(voices.voices)
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: VoiceSettings,
    ) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        if voice_id.is_empty() || voice_id.contains('/') {
            return Err(Error::Synthesis(format!("invalid voice id: {voice_id:?}")));
        }

        let url = format!("{}/text-to-speech/{voice_id}", self.base_url);
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: settings,
        };

        tracing::debug!(voice_id, chars = text.len(), "starting ElevenLabs synthesis");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "ElevenLabs request failed");
                Error::Synthesis(format!("ElevenLabs request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "ElevenLabs API error");
            return Err(Error::Synthesis(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("failed to read audio body: {e}")))?;

        if audio.is_empty() {
            return Err(Error::Synthesis("ElevenLabs returned no audio".to_string()));
        }

        tracing::info!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}
