//! TOML configuration file loading
//!
//! Supports `~/.config/companion/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CompanionConfigFile {
    /// Character used when a session has none selected
    #[serde(default)]
    pub default_character: Option<String>,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Scratch file locations
    #[serde(default)]
    pub files: FilesFileConfig,

    /// Per-stage timeouts
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo")
    pub model: Option<String>,

    /// Messages of history sent per request
    pub history_limit: Option<usize>,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "eleven_monolingual_v1")
    pub tts_model: Option<String>,

    /// Voice used before a session picks one
    pub default_voice_id: Option<String>,

    /// Voice name shown in the UI
    pub voice_name: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Scratch directories
#[derive(Debug, Default, Deserialize)]
pub struct FilesFileConfig {
    pub uploads_dir: Option<String>,
    pub outputs_dir: Option<String>,
}

/// Timeouts in seconds
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub transcribe_secs: Option<u64>,
    pub generate_secs: Option<u64>,
    pub synthesize_secs: Option<u64>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory holding the web frontend
    pub static_dir: Option<String>,

    /// Idle session lifetime in seconds
    pub session_ttl_secs: Option<u64>,

    /// Requests per minute allowed on turn endpoints
    pub rate_limit_per_minute: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CompanionConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CompanionConfigFile {
    let Some(path) = config_file_path() else {
        return CompanionConfigFile::default();
    };

    if !path.exists() {
        return CompanionConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config_file(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            CompanionConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CompanionConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> crate::Result<CompanionConfigFile> {
    let config = toml::from_str(content)?;
    Ok(config)
}

/// Return the config file path: `~/.config/companion/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("COMPANION_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::BaseDirs::new().map(|d| d.config_dir().join("companion").join("config.toml"))
}
