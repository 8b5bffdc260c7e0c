//! Daemon - the companion service
//!
//! Wires configuration into the provider clients, the turn pipeline, and the
//! HTTP API server.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{rate_limit, ApiServer, ApiState};
use crate::character::CharacterRegistry;
use crate::pipeline::TurnPipeline;
use crate::reply::OpenAiChat;
use crate::scratch::ScratchFiles;
use crate::session::SessionStore;
use crate::voice::{ElevenLabsSynthesizer, WhisperTranscriber};
use crate::{Config, Error, Result};

use secrecy::{ExposeSecret, SecretString};

/// TCP connect timeout for provider APIs; whole-call deadlines live in the pipeline
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The companion daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Shared HTTP client for every provider
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn http_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
    }

    /// Build the `ElevenLabs` client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the `ElevenLabs` API key is missing
    pub fn synthesizer(config: &Config, client: reqwest::Client) -> Result<ElevenLabsSynthesizer> {
        let key = require_key(config.api_keys.elevenlabs.as_ref(), "ELEVENLABS_API_KEY")?;
        ElevenLabsSynthesizer::new(client, key, config.voice.tts_model.clone())
    }

    /// Assemble the turn pipeline and the voice catalogue
    ///
    /// # Errors
    ///
    /// Returns error if an API key is missing or the default character is unknown
    pub fn build_state(config: &Config) -> Result<ApiState> {
        let client = Self::http_client()?;

        let openai_key = config.api_keys.openai.as_ref();
        let transcriber = WhisperTranscriber::new(
            client.clone(),
            require_key(openai_key, "OPENAI_API_KEY")?,
            config.voice.stt_model.clone(),
        )?;
        let chat = OpenAiChat::new(
            client.clone(),
            require_key(openai_key, "OPENAI_API_KEY")?,
            config.llm.model.clone(),
        )?;
        let synthesizer = Arc::new(Self::synthesizer(config, client)?);

        let characters = CharacterRegistry::builtin_with_default(&config.default_character)?;
        let sessions = SessionStore::new(config.voice.default_voice_id.clone());
        let files = ScratchFiles::new(&config.files.uploads_dir, &config.files.outputs_dir);

        let pipeline = TurnPipeline::new(
            characters,
            sessions,
            Arc::new(transcriber),
            Box::new(chat),
            synthesizer.clone(),
            files,
        )
        .with_timeouts(config.timeouts)
        .with_history_limit(config.llm.history_limit)
        .with_temperature(config.llm.temperature);

        tracing::info!(
            llm_model = %config.llm.model,
            stt_model = %config.voice.stt_model,
            tts_model = %config.voice.tts_model,
            default_character = %config.default_character,
            uploads = %config.files.uploads_dir.display(),
            outputs = %config.files.outputs_dir.display(),
            "turn pipeline ready"
        );

        Ok(ApiState {
            pipeline: Arc::new(pipeline),
            voices: Some(synthesizer),
            catalog_timeout: config.timeouts.synthesize,
            voice_name: config.voice.voice_name.clone(),
            session_ttl: config.server.session_ttl,
            rate_limiter: config
                .server
                .rate_limit_per_minute
                .map(rate_limit::turn_limiter),
        })
    }

    /// Serve until the listener fails
    ///
    /// # Errors
    ///
    /// Returns error if the pipeline cannot be built or the server stops
    pub async fn run(self) -> Result<()> {
        let state = Self::build_state(&self.config)?;
        if let Some(rpm) = self.config.server.rate_limit_per_minute {
            tracing::info!(requests_per_minute = rpm, "rate limiting turn endpoints");
        }
        ApiServer::new(Arc::new(state), self.config.server.port)
            .with_static_dir(self.config.server.static_dir.clone())
            .run()
            .await
    }
}

/// Copy a configured key out of the config, failing if it is absent
fn require_key(key: Option<&SecretString>, env_name: &str) -> Result<SecretString> {
    key.map(|k| SecretString::from(k.expose_secret().to_owned()))
        .ok_or_else(|| Error::Config(format!("{env_name} is not set")))
}
