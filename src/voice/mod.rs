//! Voice capabilities
//!
//! Speech-to-text and text-to-speech adapters. The traits are the seams the
//! turn pipeline depends on; the HTTP providers are the production backends.

mod stt;
mod tts;

pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::{ElevenLabsSynthesizer, Synthesizer, VoiceCatalog, VoiceInfo, VoiceSettings};
