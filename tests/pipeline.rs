//! Turn pipeline integration tests

use std::time::Duration;

use voice_companion::reply::ChatRole;
use voice_companion::{ConversationMessage, Error, SessionId, StageTimeouts};

mod common;
use common::{FakeChat, FakeSynth, FakeTranscriber, Harness, FAKE_MP3, TEST_DEFAULT_VOICE};

fn history(len: usize) -> Vec<ConversationMessage> {
    (0..len)
        .map(|i| {
            if i % 2 == 0 {
                ConversationMessage::user(format!("question {i}"))
            } else {
                ConversationMessage::assistant(format!("answer {i}"))
            }
        })
        .collect()
}

#[tokio::test]
async fn test_reply_without_selection_uses_default_character() {
    let h = Harness::happy("Hi there!");
    let session = SessionId::new();

    let reply = h
        .pipeline
        .reply(session, &[ConversationMessage::user("hello")])
        .await
        .unwrap();

    assert_eq!(reply.text, "Hi there!");
    let request = h.chat.last_request();
    let default = h.pipeline.characters().default_character();
    assert_eq!(request.messages[0].role, ChatRole::System);
    assert_eq!(request.messages[0].content, default.system_prompt);
    assert_eq!(h.synth.last_voice(), TEST_DEFAULT_VOICE);
}

#[tokio::test]
async fn test_reply_uses_selected_character_and_voice() {
    let h = Harness::happy("Ahoy, matey!");
    let session = SessionId::new();
    h.pipeline
        .sessions()
        .set_character(session, Some("pirate-girl"), Some("voice-xyz"))
        .await;

    h.pipeline
        .reply(session, &[ConversationMessage::user("hello")])
        .await
        .unwrap();

    let expected = h.pipeline.characters().get("pirate-girl").unwrap();
    let request = h.chat.last_request();
    assert_eq!(request.messages[0].content, expected.system_prompt);
    assert_eq!(request.messages[1].role, ChatRole::User);
    assert_eq!(request.messages[1].content, "hello");
    assert_eq!(h.synth.last_voice(), "voice-xyz");
}

#[tokio::test]
async fn test_selecting_sonic_sends_sonic_prompt() {
    let h = Harness::happy("Gotta go fast!");
    let session = SessionId::new();
    h.pipeline
        .sessions()
        .set_character(session, Some("sonic"), Some("voice-sonic"))
        .await;

    h.pipeline.reply(session, &history(1)).await.unwrap();

    let leading = &h.chat.last_request().messages[0];
    assert_eq!(leading.role, ChatRole::System);
    assert!(leading
        .content
        .starts_with("You are Sonic, the world's fastest hedgehog."));
}

#[tokio::test]
async fn test_unknown_selection_falls_back_to_default() {
    let h = Harness::happy("Hello!");
    let session = SessionId::new();
    h.pipeline
        .sessions()
        .set_character(session, Some("dragon"), Some("voice-xyz"))
        .await;

    h.pipeline
        .reply(session, &[ConversationMessage::user("hi")])
        .await
        .unwrap();

    let default = h.pipeline.characters().default_character();
    assert_eq!(h.chat.last_request().messages[0].content, default.system_prompt);
}

#[tokio::test]
async fn test_history_is_bounded_to_most_recent_messages() {
    let h = Harness::happy("ok");
    let conversation = history(40);

    h.pipeline
        .reply(SessionId::new(), &conversation)
        .await
        .unwrap();

    let request = h.chat.last_request();
    assert_eq!(request.messages.len(), 31);
    assert_eq!(request.messages[1].content, "question 10");
    assert_eq!(request.messages[30].content, "answer 39");
}

#[tokio::test]
async fn test_short_history_is_sent_whole() {
    let h = Harness::happy("ok");

    h.pipeline
        .reply(SessionId::new(), &history(3))
        .await
        .unwrap();

    assert_eq!(h.chat.last_request().messages.len(), 4);
}

#[tokio::test]
async fn test_empty_history_sends_only_system_prompt() {
    let h = Harness::happy("Hello, friend!");

    h.pipeline.reply(SessionId::new(), &[]).await.unwrap();

    let request = h.chat.last_request();
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, ChatRole::System);
}

#[tokio::test]
async fn test_reply_audio_is_exposed_in_outputs() {
    let h = Harness::happy("Gotta go fast!");

    let reply = h.pipeline.reply(SessionId::new(), &history(1)).await.unwrap();

    assert!(reply.audio_file.ends_with(".mp3"));
    assert_eq!(h.outputs(), vec![reply.audio_file.clone()]);
    let audio = h.pipeline.files().read_output(&reply.audio_file).await.unwrap();
    assert_eq!(audio, FAKE_MP3);
}

#[tokio::test]
async fn test_previous_outputs_are_purged_each_turn() {
    let h = Harness::happy("again");
    let session = SessionId::new();

    let first = h.pipeline.reply(session, &history(1)).await.unwrap();
    let second = h.pipeline.reply(session, &history(1)).await.unwrap();

    assert_ne!(first.audio_file, second.audio_file);
    assert_eq!(h.outputs(), vec![second.audio_file]);
    assert!(matches!(
        h.pipeline.files().read_output(&first.audio_file).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_generation_failure_skips_synthesis() {
    let h = Harness::new(
        FakeTranscriber::saying("hi"),
        FakeChat::failing(),
        FakeSynth::working(),
    );

    let result = h.pipeline.reply(SessionId::new(), &history(1)).await;

    assert!(matches!(result, Err(Error::Generation(_))));
    assert_eq!(h.synth.call_count(), 0);
    assert!(h.outputs().is_empty());
}

#[tokio::test]
async fn test_synthesis_failure_exposes_nothing() {
    let h = Harness::new(
        FakeTranscriber::saying("hi"),
        FakeChat::replying("You'll never hear this"),
        FakeSynth::failing(),
    );

    let result = h.pipeline.reply(SessionId::new(), &history(1)).await;

    assert!(matches!(result, Err(Error::Synthesis(_))));
    assert_eq!(h.chat.call_count(), 1);
    assert!(h.outputs().is_empty());
}

#[tokio::test]
async fn test_turn_appends_transcript_to_history() {
    let h = Harness::happy("Lava comes out!");

    let outcome = h
        .pipeline
        .turn(SessionId::new(), b"RIFF-audio", &history(2))
        .await
        .unwrap();

    assert_eq!(outcome.transcript, "what is a volcano");
    assert_eq!(outcome.reply.text, "Lava comes out!");

    let request = h.chat.last_request();
    let last = request.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::User);
    assert_eq!(last.content, "what is a volcano");
    assert_eq!(h.transcriber.calls.lock().unwrap()[0], b"RIFF-audio");
}

#[tokio::test]
async fn test_transcription_failure_aborts_turn() {
    let h = Harness::new(
        FakeTranscriber::failing(),
        FakeChat::replying("unused"),
        FakeSynth::working(),
    );

    let result = h.pipeline.turn(SessionId::new(), b"RIFF-audio", &[]).await;

    assert!(matches!(result, Err(Error::Transcription(_))));
    assert_eq!(h.chat.call_count(), 0);
    assert_eq!(h.synth.call_count(), 0);
    assert!(h.outputs().is_empty());
}

#[tokio::test]
async fn test_upload_is_deleted_after_transcription() {
    let h = Harness::happy("ok");

    let text = h.pipeline.transcribe_upload(b"RIFF-audio").await.unwrap();

    assert_eq!(text, "what is a volcano");
    assert!(h.uploads().is_empty());
}

#[tokio::test]
async fn test_upload_is_deleted_when_transcription_fails() {
    let h = Harness::new(
        FakeTranscriber::failing(),
        FakeChat::replying("unused"),
        FakeSynth::working(),
    );

    assert!(h.pipeline.transcribe_upload(b"RIFF-audio").await.is_err());
    assert_eq!(h.transcriber.call_count(), 1);
    assert!(h.uploads().is_empty());
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let h = Harness::happy("ok");

    let result = h.pipeline.transcribe_upload(&[]).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(h.transcriber.call_count(), 0);
}

#[tokio::test]
async fn test_slow_transcription_times_out_as_transcription_error() {
    let mut transcriber = FakeTranscriber::saying("too late");
    transcriber.delay = Some(Duration::from_secs(5));
    let h = Harness::with_timeouts(
        transcriber,
        FakeChat::replying("unused"),
        FakeSynth::working(),
        StageTimeouts {
            transcribe: Duration::from_millis(20),
            ..StageTimeouts::default()
        },
    );

    let result = h.pipeline.turn(SessionId::new(), b"RIFF-audio", &[]).await;

    assert!(matches!(result, Err(Error::Transcription(_))));
    assert_eq!(h.chat.call_count(), 0);
    assert!(h.uploads().is_empty());
}

#[tokio::test]
async fn test_sessions_do_not_share_selection() {
    let h = Harness::happy("hello");
    let a = SessionId::new();
    let b = SessionId::new();
    h.pipeline.sessions().set_character(a, Some("eric"), Some("voice-a")).await;

    h.pipeline.reply(b, &history(1)).await.unwrap();

    let default = h.pipeline.characters().default_character();
    assert_eq!(h.chat.last_request().messages[0].content, default.system_prompt);
    assert_eq!(h.synth.last_voice(), TEST_DEFAULT_VOICE);
}
