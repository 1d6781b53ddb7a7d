//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use dendrite::voice::{Player, SpeechOutput, TextToSpeech};
use dendrite::{ChatModel, Error, Input, InputSource, Message, Result, TtsConfig};
use secrecy::SecretString;

/// API key the mock TTS endpoint accepts
pub const GOOD_TTS_KEY: &str = "good-key";

/// Serve `router` on an ephemeral local port and return its origin
pub async fn spawn_mock(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock server");
    let addr = listener.local_addr().expect("mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server failed");
    });
    format!("http://{addr}")
}

/// Mock `ElevenLabs` endpoint: echoes the text back as "audio"
///
/// Texts starting with `slow` take longer to synthesize, texts starting
/// with `reject` fail.
async fn mock_synthesize(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Response {
    let key = headers.get("xi-api-key").and_then(|v| v.to_str().ok());
    if key != Some(GOOD_TTS_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"detail":{"status":"invalid_api_key"}}"#,
        )
            .into_response();
    }

    let text = body["text"].as_str().unwrap_or_default().to_string();
    if text.starts_with("reject") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "synthesis failed").into_response();
    }
    if text.starts_with("slow") {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    text.into_bytes().into_response()
}

/// Start a mock TTS server
pub async fn spawn_tts_mock() -> String {
    let router = axum::Router::new().route(
        "/v1/text-to-speech/{voice_id}",
        axum::routing::post(mock_synthesize),
    );
    spawn_mock(router).await
}

/// Build a TTS client against `base_url`
pub fn tts_client(base_url: &str, api_key: &str) -> TextToSpeech {
    TextToSpeech::new(&TtsConfig {
        api_key: SecretString::from(api_key.to_string()),
        voice_id: "test-voice".to_string(),
        model: None,
        base_url: base_url.to_string(),
    })
    .expect("failed to build TTS client")
}

/// Build speech output backed by the mock TTS server and a counting player
pub async fn speech_output(api_key: &str, scratch_dir: &Path) -> (SpeechOutput, Arc<CountingPlayer>) {
    let base_url = spawn_tts_mock().await;
    let player = Arc::new(CountingPlayer::default());
    let speech = SpeechOutput::new(
        tts_client(&base_url, api_key),
        Arc::clone(&player) as Arc<dyn Player>,
        scratch_dir,
    );
    (speech, player)
}

/// Player that records what it played and how many plays overlapped
#[derive(Default)]
pub struct CountingPlayer {
    active: AtomicUsize,
    max_active: AtomicUsize,
    played: Mutex<Vec<String>>,
}

impl CountingPlayer {
    /// Highest number of simultaneous plays observed
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Contents of every file played, in order
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl Player for CountingPlayer {
    fn play_file(&self, path: &Path) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let content = std::fs::read_to_string(path)?;
        std::thread::sleep(Duration::from_millis(30));
        // Still ours after "playing"
        assert_eq!(std::fs::read_to_string(path)?, content);
        self.played.lock().unwrap().push(content);

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Chat model returning canned replies and recording every request
#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<(Vec<Message>, u32)>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Arc::new(Mutex::new(
                replies.iter().map(ToString::to_string).collect(),
            )),
            calls: Arc::default(),
        }
    }

    /// Requests seen so far: (messages, `max_tokens`)
    pub fn calls(&self) -> Vec<(Vec<Message>, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message], max_tokens: u32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), max_tokens));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Chat("connection refused".to_string()))
    }
}

/// Input source replaying a fixed list of inputs, then closing
pub struct ScriptedInput {
    inputs: VecDeque<Input>,
    probe: Option<Box<dyn Fn() -> usize + Send + Sync>>,
    probes: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedInput {
    pub fn new(inputs: Vec<Input>) -> Self {
        Self {
            inputs: inputs.into(),
            probe: None,
            probes: Arc::default(),
        }
    }

    /// Text inputs only
    pub fn lines(lines: &[&str]) -> Self {
        Self::new(
            lines
                .iter()
                .map(|l| Input::Text((*l).to_string()))
                .collect(),
        )
    }

    /// Sample `probe` every time input is read
    pub fn with_probe(mut self, probe: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Values sampled by the probe, one per read
    pub fn probes(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.probes)
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read(&mut self) -> Result<Input> {
        if let Some(probe) = &self.probe {
            self.probes.lock().unwrap().push(probe());
        }
        Ok(self.inputs.pop_front().unwrap_or(Input::Closed))
    }
}
