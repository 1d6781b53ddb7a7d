//! Microphone input: calibrate, capture one utterance, transcribe

use std::time::Duration;

use async_trait::async_trait;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::detector::UtteranceDetector;
use super::stt::SpeechToText;
use crate::input::{Input, InputSource};
use crate::{Error, Result};

/// Ambient noise sampled before listening
pub const CALIBRATION: Duration = Duration::from_secs(1);

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest utterance kept before capture is cut off
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// Reads user turns from the microphone
pub struct VoiceInput {
    stt: SpeechToText,
}

impl VoiceInput {
    /// Create a voice input transcribing with `stt`
    #[must_use]
    pub const fn new(stt: SpeechToText) -> Self {
        Self { stt }
    }
}

#[async_trait]
impl InputSource for VoiceInput {
    async fn read(&mut self) -> Result<Input> {
        let samples = tokio::task::spawn_blocking(record_utterance)
            .await
            .map_err(|e| Error::Audio(format!("capture task failed: {e}")))??;

        if samples.is_empty() {
            return Ok(Input::Miss);
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        Ok(classify_transcript(self.stt.transcribe(&wav).await))
    }
}

/// Record a single utterance from the default microphone
///
/// Blocks for [`CALIBRATION`] to measure ambient noise, then until speech
/// followed by silence has been captured.
///
/// # Errors
///
/// Returns error if the input device cannot be opened
pub fn record_utterance() -> Result<Vec<f32>> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let mut detector = UtteranceDetector::new();
    detector.calibrate(&capture.collect(CALIBRATION));

    println!("Listening...");
    let utterance = listen(&mut detector, || capture.collect(POLL_INTERVAL));

    capture.stop();
    Ok(utterance)
}

/// Feed chunks from `next_chunk` to a calibrated detector until an utterance
/// completes or reaches [`MAX_UTTERANCE_SAMPLES`]
fn listen(detector: &mut UtteranceDetector, mut next_chunk: impl FnMut() -> Vec<f32>) -> Vec<f32> {
    loop {
        if detector.process(&next_chunk()) {
            break;
        }
        if detector.speech_buffer().len() > MAX_UTTERANCE_SAMPLES {
            tracing::debug!("utterance too long, cutting off");
            break;
        }
    }

    detector.take_speech_buffer()
}

/// Map a transcription outcome to user input
///
/// Both an empty transcript and a failed request count as a miss.
#[must_use]
pub fn classify_transcript(transcript: Result<String>) -> Input {
    match transcript {
        Ok(text) if text.trim().is_empty() => {
            println!("Could not understand audio");
            Input::Miss
        }
        Ok(text) => {
            println!("You said: {text}");
            Input::Text(text)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not request transcription results");
            Input::Miss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: usize = SAMPLE_RATE as usize / 10;

    #[test]
    fn test_listen_stops_after_trailing_silence() {
        let mut detector = UtteranceDetector::new();
        detector.calibrate(&[0.001; SAMPLE_RATE as usize]);

        let mut chunks = vec![vec![0.0; CHUNK]; 2];
        chunks.extend(vec![vec![0.4; CHUNK]; 5]);
        chunks.extend(vec![vec![0.0; CHUNK]; 20]);
        let mut chunks = chunks.into_iter();

        let utterance = listen(&mut detector, || chunks.next().unwrap_or_default());
        assert!(utterance.len() >= 5 * CHUNK);
        // Leading silence is not part of the utterance
        assert!(utterance[0] > 0.0);
        // Remaining chunks were never pulled
        assert_eq!(chunks.len(), 12);
    }

    #[test]
    fn test_listen_cuts_off_endless_speech() {
        let mut detector = UtteranceDetector::new();
        detector.calibrate(&[]);

        let utterance = listen(&mut detector, || vec![0.4; CHUNK]);
        assert!(utterance.len() > MAX_UTTERANCE_SAMPLES);
        assert!(utterance.len() <= MAX_UTTERANCE_SAMPLES + CHUNK);
    }

    #[test]
    fn test_classify_transcript() {
        assert_eq!(
            classify_transcript(Ok("Hello there".to_string())),
            Input::Text("Hello there".to_string())
        );
        assert_eq!(classify_transcript(Ok("  ".to_string())), Input::Miss);
        assert_eq!(
            classify_transcript(Err(Error::Stt("API error 401".to_string()))),
            Input::Miss
        );
    }
}
