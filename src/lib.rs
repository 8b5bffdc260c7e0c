//! Voice Companion - spoken conversations with kid-friendly characters
//!
//! A turn takes a short recording, transcribes it, asks a chat model to answer
//! in the voice of the selected character, synthesizes the answer, and exposes
//! the audio for playback:
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌────────────┐   ┌─────────┐
//! │  upload  │──▶│ transcribe │──▶│  reply   │──▶│ synthesize │──▶│ /listen │
//! └──────────┘   └────────────┘   └──────────┘   └────────────┘   └─────────┘
//!                  Whisper          chat model     ElevenLabs
//! ```
//!
//! Session state (character and voice choice) lives in memory per client;
//! conversation history is owned and resent by the caller.

pub mod api;
pub mod character;
pub mod config;
pub mod daemon;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod reply;
pub mod scratch;
pub mod session;
pub mod voice;

pub use character::{Character, CharacterRegistry};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result, Stage};
pub use history::{ConversationMessage, Role};
pub use pipeline::{StageTimeouts, TurnOutcome, TurnPipeline, TurnReply};
pub use reply::{ChatModel, ReplyGenerator};
pub use scratch::ScratchFiles;
pub use session::{NextStep, SessionId, SessionStore};
pub use voice::{Synthesizer, Transcriber, VoiceCatalog, VoiceSettings};
