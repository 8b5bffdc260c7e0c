//! Configuration management for the companion

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::character::{CharacterRegistry, DEFAULT_CHARACTER_KEY};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::pipeline::StageTimeouts;
use crate::reply::REPLY_TEMPERATURE;
use crate::Result;

use self::file::CompanionConfigFile;

/// `ElevenLabs` "Rachel", used until a session picks a voice
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Companion configuration
#[derive(Debug)]
pub struct Config {
    /// Character used when a session has none selected
    pub default_character: String,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Reply generation configuration
    pub llm: LlmConfig,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Scratch file locations
    pub files: FilesConfig,

    /// Per-stage capability timeouts
    pub timeouts: StageTimeouts,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Web frontend served for unmatched paths
    pub static_dir: Option<PathBuf>,

    /// Idle sessions are dropped after this long
    pub session_ttl: Duration,

    /// Requests per minute on turn endpoints (`None` disables limiting)
    pub rate_limit_per_minute: Option<u32>,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and chat completions)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (speech synthesis)
    pub elevenlabs: Option<SecretString>,
}

/// Reply generation configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Messages of history sent per request
    pub history_limit: usize,

    /// Sampling temperature
    pub temperature: f32,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "eleven_monolingual_v1")
    pub tts_model: String,

    /// Voice used before a session picks one
    pub default_voice_id: String,

    /// Voice name shown in the UI
    pub voice_name: String,
}

/// Scratch file locations
#[derive(Debug, Clone)]
pub struct FilesConfig {
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the configured default character is not registered
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the configured default character is not registered
    pub fn from_sources(
        fc: CompanionConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let parse_env = |key: &str| env(key).and_then(|v| v.trim().parse::<u64>().ok());

        let default_character = env("COMPANION_DEFAULT_CHARACTER")
            .or(fc.default_character)
            .unwrap_or_else(|| DEFAULT_CHARACTER_KEY.to_string());

        // Fail at startup rather than on the first turn
        CharacterRegistry::builtin_with_default(&default_character)?;

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
        };

        let server = ServerConfig {
            port: env("COMPANION_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(5000),
            static_dir: env("COMPANION_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            session_ttl: Duration::from_secs(
                parse_env("COMPANION_SESSION_TTL")
                    .or(fc.server.session_ttl_secs)
                    .unwrap_or(24 * 60 * 60),
            ),
            rate_limit_per_minute: env("COMPANION_RATE_LIMIT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_per_minute)
                .filter(|rpm| *rpm > 0),
        };

        let llm = LlmConfig {
            model: env("COMPANION_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            history_limit: env("COMPANION_HISTORY_LIMIT")
                .and_then(|s| s.parse().ok())
                .or(fc.llm.history_limit)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            temperature: env("COMPANION_TEMPERATURE")
                .and_then(|s| s.parse().ok())
                .or(fc.llm.temperature)
                .unwrap_or(REPLY_TEMPERATURE),
        };

        let voice = VoiceConfig {
            stt_model: env("COMPANION_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("COMPANION_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "eleven_monolingual_v1".to_string()),
            default_voice_id: env("COMPANION_DEFAULT_VOICE_ID")
                .or(fc.voice.default_voice_id)
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            voice_name: env("COMPANION_VOICE_NAME")
                .or(fc.voice.voice_name)
                .unwrap_or_else(|| "Raj".to_string()),
        };

        let files = FilesConfig {
            uploads_dir: env("COMPANION_UPLOADS_DIR")
                .or(fc.files.uploads_dir)
                .map_or_else(|| default_scratch_dir("uploads"), PathBuf::from),
            outputs_dir: env("COMPANION_OUTPUTS_DIR")
                .or(fc.files.outputs_dir)
                .map_or_else(|| default_scratch_dir("outputs"), PathBuf::from),
        };

        let defaults = StageTimeouts::default();
        let timeouts = StageTimeouts {
            transcribe: parse_env("COMPANION_TRANSCRIBE_TIMEOUT")
                .or(fc.timeouts.transcribe_secs)
                .map_or(defaults.transcribe, Duration::from_secs),
            generate: parse_env("COMPANION_GENERATE_TIMEOUT")
                .or(fc.timeouts.generate_secs)
                .map_or(defaults.generate, Duration::from_secs),
            synthesize: parse_env("COMPANION_SYNTHESIZE_TIMEOUT")
                .or(fc.timeouts.synthesize_secs)
                .map_or(defaults.synthesize, Duration::from_secs),
        };

        Ok(Self {
            default_character,
            server,
            api_keys,
            llm,
            voice,
            files,
            timeouts,
        })
    }
}

/// Scratch area under the user data dir: `~/.local/share/companion/<name>` on Linux
fn default_scratch_dir(name: &str) -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(name),
        |d| d.data_dir().join("companion").join(name),
    )
}
