//! Utterance boundary detection
//!
//! Splits a microphone stream into a single utterance using RMS energy:
//! speech starts when energy rises above a threshold calibrated from
//! ambient noise, and ends after a run of silence.

/// Lowest threshold accepted after calibration
const ENERGY_FLOOR: f32 = 0.01;

/// Threshold used before any calibration
const DEFAULT_THRESHOLD: f32 = 0.03;

/// Speech must exceed ambient noise by this factor
const AMBIENT_MULTIPLIER: f32 = 1.5;

/// Minimum duration of speech to accept (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends an utterance (in samples at 16kHz)
const SILENCE_SAMPLES: usize = 12000; // 0.75 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Listening,
    /// Speech followed by silence, utterance ready
    Complete,
}

/// Detects the start and end of a spoken utterance
#[derive(Debug)]
pub struct UtteranceDetector {
    threshold: f32,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector with the default energy threshold
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Derive the speech threshold from a sample of ambient noise
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let noise = calculate_energy(ambient);
        self.threshold = (noise * AMBIENT_MULTIPLIER).max(ENERGY_FLOOR);
        tracing::debug!(noise, threshold = self.threshold, "calibrated for ambient noise");
    }

    /// Feed audio samples
    ///
    /// Returns true once an utterance is complete
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
            }
            DetectorState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    self.state = DetectorState::Complete;
                } else if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("too little speech before silence, resetting");
                    self.reset();
                }
            }
            DetectorState::Complete => {}
        }

        self.state == DetectorState::Complete
    }

    /// Accumulated utterance samples
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Take the utterance samples and return to idle
    pub fn take_speech_buffer(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Current speech energy threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);

        assert!(calculate_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_calibration_never_drops_below_floor() {
        let mut detector = UtteranceDetector::new();
        detector.calibrate(&[0.0; 1600]);
        assert!((detector.threshold() - ENERGY_FLOOR).abs() < f32::EPSILON);

        detector.calibrate(&[0.1; 1600]);
        assert!(detector.threshold() > 0.14);
    }

    #[test]
    fn test_short_blip_resets() {
        let mut detector = UtteranceDetector::new();

        assert!(!detector.process(&[0.5; 800]));
        assert_eq!(detector.state(), DetectorState::Listening);

        assert!(!detector.process(&[0.0; SILENCE_SAMPLES * 2 + 1]));
        assert_eq!(detector.state(), DetectorState::Idle);
        assert!(detector.speech_buffer().is_empty());
    }
}
