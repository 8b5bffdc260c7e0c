//! Shared test utilities: recording fakes for every capability and a
//! pipeline wired to a temporary scratch area

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use voice_companion::api::{rate_limit, ApiState};
use voice_companion::reply::ChatRequest;
use voice_companion::voice::VoiceInfo;
use voice_companion::{
    CharacterRegistry, ChatModel, Error, Result, ScratchFiles, SessionStore, StageTimeouts,
    Synthesizer, Transcriber, TurnPipeline, VoiceCatalog, VoiceSettings,
};

pub const TEST_DEFAULT_VOICE: &str = "default-voice";
pub const FAKE_MP3: &[u8] = b"ID3\x03fake-mp3-frames";

/// Transcriber that returns a fixed transcript, fails, or stalls
#[derive(Clone)]
pub struct FakeTranscriber {
    pub transcript: Option<String>,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeTranscriber {
    pub fn saying(text: &str) -> Self {
        Self {
            transcript: Some(text.to_string()),
            delay: None,
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            delay: None,
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &[u8], _file_name: &str) -> Result<String> {
        self.calls.lock().unwrap().push(audio.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.transcript
            .clone()
            .ok_or_else(|| Error::Transcription("speech service unreachable".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Chat model that records every request and answers from a script
#[derive(Clone)]
pub struct FakeChat {
    pub candidates: Option<Vec<String>>,
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FakeChat {
    pub fn replying(text: &str) -> Self {
        Self {
            candidates: Some(vec![text.to_string()]),
            requests: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: None,
            requests: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no chat request recorded")
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, request: &ChatRequest) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(request.clone());
        self.candidates
            .clone()
            .ok_or_else(|| Error::Generation("model rate limited".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-chat"
    }
}

/// Synthesizer that records (text, voice) pairs
#[derive(Clone)]
pub struct FakeSynth {
    pub fail: bool,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSynth {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_voice(&self) -> String {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, voice)| voice.clone())
            .expect("no synthesis recorded")
    }
}

#[async_trait]
impl Synthesizer for FakeSynth {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        _settings: VoiceSettings,
    ) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        if self.fail {
            return Err(Error::Synthesis("voice service returned 500".to_string()));
        }
        Ok(FAKE_MP3.to_vec())
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

#[async_trait]
impl VoiceCatalog for FakeSynth {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        Ok(vec![VoiceInfo {
            voice_id: TEST_DEFAULT_VOICE.to_string(),
            name: "Rachel".to_string(),
            category: Some("premade".to_string()),
            preview_url: None,
        }])
    }
}

/// Voice catalogue that never answers
pub struct StalledCatalog;

#[async_trait]
impl VoiceCatalog for StalledCatalog {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// A pipeline over fakes plus handles to inspect them afterwards
pub struct Harness {
    pub pipeline: Arc<TurnPipeline>,
    pub transcriber: FakeTranscriber,
    pub chat: FakeChat,
    pub synth: FakeSynth,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new(transcriber: FakeTranscriber, chat: FakeChat, synth: FakeSynth) -> Self {
        Self::with_timeouts(transcriber, chat, synth, StageTimeouts::default())
    }

    pub fn with_timeouts(
        transcriber: FakeTranscriber,
        chat: FakeChat,
        synth: FakeSynth,
        timeouts: StageTimeouts,
    ) -> Self {
        let scratch = tempfile::tempdir().expect("failed to create scratch dir");
        let files = ScratchFiles::new(
            scratch.path().join("uploads"),
            scratch.path().join("outputs"),
        );

        let pipeline = TurnPipeline::new(
            CharacterRegistry::builtin(),
            SessionStore::new(TEST_DEFAULT_VOICE),
            Arc::new(transcriber.clone()),
            Box::new(chat.clone()),
            Arc::new(synth.clone()),
            files,
        )
        .with_timeouts(timeouts);

        Self {
            pipeline: Arc::new(pipeline),
            transcriber,
            chat,
            synth,
            scratch,
        }
    }

    /// Everything works and the model answers `reply`
    pub fn happy(reply: &str) -> Self {
        Self::new(
            FakeTranscriber::saying("what is a volcano"),
            FakeChat::replying(reply),
            FakeSynth::working(),
        )
    }

    pub fn uploads(&self) -> Vec<String> {
        list_dir(&self.scratch.path().join("uploads"))
    }

    pub fn outputs(&self) -> Vec<String> {
        list_dir(&self.scratch.path().join("outputs"))
    }

    /// HTTP state over this pipeline
    pub fn api_state(&self, rate_limit_per_minute: Option<u32>) -> Arc<ApiState> {
        Arc::new(ApiState {
            pipeline: self.pipeline.clone(),
            voices: Some(Arc::new(self.synth.clone())),
            catalog_timeout: Duration::from_secs(60),
            voice_name: "Rachel".to_string(),
            session_ttl: Duration::from_secs(3600),
            rate_limiter: rate_limit_per_minute.map(rate_limit::turn_limiter),
        })
    }
}

fn list_dir(dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
