//! Error types for the companion

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for companion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the companion
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech-to-text capability failed or returned unusable output
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Text-generation capability failed or returned unusable output
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech capability failed or returned unusable output
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Scratch file could not be written or read
    #[error("file error at {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied something unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Stage of a turn that an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Generation,
    Synthesis,
    FileIo,
}

impl Stage {
    /// Stable identifier used in API error codes and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
            Self::FileIo => "file_io",
        }
    }
}

impl Error {
    /// Build a file error for `path`
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// The turn stage this error aborted, if any
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Transcription(_) => Some(Stage::Transcription),
            Self::Generation(_) => Some(Stage::Generation),
            Self::Synthesis(_) => Some(Stage::Synthesis),
            Self::FileIo { .. } | Self::Io(_) => Some(Stage::FileIo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_for_capability_errors() {
        assert_eq!(
            Error::Transcription("x".into()).stage(),
            Some(Stage::Transcription)
        );
        assert_eq!(Error::Generation("x".into()).stage(), Some(Stage::Generation));
        assert_eq!(Error::Synthesis("x".into()).stage(), Some(Stage::Synthesis));
        assert_eq!(Error::Config("x".into()).stage(), None);
    }

    #[test]
    fn test_file_io_message_includes_path() {
        let err = Error::file_io(
            "/tmp/outputs/a.mp3",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.stage(), Some(Stage::FileIo));
        assert!(err.to_string().contains("/tmp/outputs/a.mp3"));
    }
}
