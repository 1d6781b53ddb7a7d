//! Speech output: synthesize, then play through a scratch file
//!
//! Every reply is synthesized on its own task. Playback goes through a
//! fixed-name file, so writing, playing and deleting that file happens under
//! a lock owned by [`SpeechOutput`]. Replies are played in the order they
//! were handed in, even when a later synthesis finishes first. Every reply
//! takes its turn exactly once, whether it plays, fails or panics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::playback::Player;
use super::tts::Synthesizer;
use crate::{Error, Result};

/// Name of the scratch file audio is written to before playback
pub const SPEECH_FILE: &str = "speech.mpeg";

/// Speaks assistant replies in the background
pub struct SpeechOutput {
    inner: Arc<Inner>,
}

struct Inner {
    tts: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
    speech_file: PathBuf,
    file_lock: Mutex<()>,
    queue: PlaybackQueue,
}

impl SpeechOutput {
    /// Create a speech output writing its scratch file into `scratch_dir`
    #[must_use]
    pub fn new(
        tts: impl Synthesizer + 'static,
        player: Arc<dyn Player>,
        scratch_dir: &Path,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tts: Arc::new(tts),
                player,
                speech_file: scratch_dir.join(SPEECH_FILE),
                file_lock: Mutex::new(()),
                queue: PlaybackQueue::new(),
            }),
        }
    }

    /// Path of the scratch audio file
    #[must_use]
    pub fn speech_file(&self) -> &Path {
        &self.inner.speech_file
    }

    /// Synthesize and play `text` on a background task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn speak(&self, text: &str) -> PlaybackHandle {
        let ticket = self.inner.queue.issue();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        tracing::debug!(ticket, text_len = text.len(), "queueing speech");

        let task = tokio::spawn(async move { inner.speak_in_turn(ticket, text).await });
        PlaybackHandle { task }
    }

    /// Wait until every reply handed to [`speak`](Self::speak) so far has
    /// finished (played or failed)
    pub async fn wait_idle(&self) {
        self.inner.queue.wait_idle().await;
    }
}

impl Inner {
    async fn speak_in_turn(&self, ticket: u64, text: String) -> Result<()> {
        // Separate task: a panicking synthesizer must not skip the turn below
        let tts = Arc::clone(&self.tts);
        let synthesized = tokio::spawn(async move { tts.synthesize(&text).await })
            .await
            .map_err(|e| Error::Tts(format!("synthesis task failed: {e}")))
            .and_then(|r| r);

        self.queue.wait_turn(ticket).await;
        let _turn = TurnGuard(&self.queue);

        let audio = match synthesized {
            Ok(audio) => audio,
            Err(Error::TtsStatus { status, body }) => {
                tracing::warn!(status, body = %body, "TTS request failed");
                return Err(Error::TtsStatus { status, body });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TTS request failed");
                return Err(e);
            }
        };

        let _file = self.file_lock.lock().await;
        let played = self.play_through_file(audio).await;
        if let Err(e) = &played {
            tracing::warn!(error = %e, "playback failed");
        }
        played
    }

    async fn play_through_file(&self, audio: Vec<u8>) -> Result<()> {
        tokio::fs::write(&self.speech_file, audio).await?;

        let player = Arc::clone(&self.player);
        let path = self.speech_file.clone();
        let played = tokio::task::spawn_blocking(move || player.play_file(&path))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))
            .and_then(|r| r);

        if let Err(e) = tokio::fs::remove_file(&self.speech_file).await {
            tracing::warn!(path = %self.speech_file.display(), error = %e, "failed to remove speech file");
        }

        played
    }
}

/// Handle to a reply being spoken
#[must_use = "wait on the handle or detach it"]
pub struct PlaybackHandle {
    task: JoinHandle<Result<()>>,
}

impl PlaybackHandle {
    /// Wait for synthesis and playback to finish
    ///
    /// # Errors
    ///
    /// Returns the synthesis or playback failure
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    /// Let playback continue without waiting for it
    ///
    /// Failures are still logged by the playback task.
    pub fn detach(self) {
        drop(self.task);
    }

    /// Whether the playback task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Hands out playback turns in call order
struct PlaybackQueue {
    issued: AtomicU64,
    served: watch::Sender<u64>,
}

impl PlaybackQueue {
    fn new() -> Self {
        let (served, _) = watch::channel(0);
        Self {
            issued: AtomicU64::new(0),
            served,
        }
    }

    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst)
    }

    async fn wait_turn(&self, ticket: u64) {
        let mut rx = self.served.subscribe();
        // The sender lives as long as the queue
        let _ = rx.wait_for(|served| *served >= ticket).await;
    }

    async fn wait_idle(&self) {
        let target = self.issued.load(Ordering::SeqCst);
        let mut rx = self.served.subscribe();
        let _ = rx.wait_for(|served| *served >= target).await;
    }

    fn advance(&self) {
        self.served.send_modify(|served| *served += 1);
    }
}

/// Passes the turn to the next reply when dropped
struct TurnGuard<'a>(&'a PlaybackQueue);

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.advance();
    }
}
