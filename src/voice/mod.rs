//! Voice processing module
//!
//! Microphone capture and transcription on the way in, speech synthesis and
//! playback on the way out.

mod capture;
mod detector;
mod listener;
mod playback;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use detector::{DetectorState, UtteranceDetector, calculate_energy};
pub use listener::{CALIBRATION, VoiceInput, classify_transcript, record_utterance};
pub use playback::{AudioPlayback, DecodedAudio, Player, decode_mp3};
pub use speaker::{PlaybackHandle, SPEECH_FILE, SpeechOutput};
pub use stt::SpeechToText;
pub use tts::{Synthesizer, TextToSpeech};
