//! Microphone capture
//!
//! The default input device is resolved once and every stream is built on
//! that device. Input with more than one channel is averaged to mono inside
//! the stream callback, so callers only ever see 16 kHz mono samples.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture rate expected by the transcription service
pub const SAMPLE_RATE: u32 = 16000;

/// A microphone opened at [`SAMPLE_RATE`]
///
/// The live `cpal` stream is not `Send`; a capture stays on the thread that
/// started it.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    pending: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Resolve the default input device and the narrowest channel layout it
    /// offers at [`SAMPLE_RATE`]
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it cannot record at 16 kHz
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let rate = SampleRate(SAMPLE_RATE);
        let range = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| {
                Error::Audio(format!("input device cannot record at {SAMPLE_RATE} Hz"))
            })?;
        let config = range.with_sample_rate(rate).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "microphone selected"
        );

        Ok(Self {
            device,
            config,
            pending: Arc::default(),
            stream: None,
        })
    }

    /// Start recording into the pending buffer
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        let channels = self.config.channels;
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pending) = pending.lock() {
                        append_mono(&mut pending, data, channels);
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        self.stream = Some(stream);
        tracing::debug!("microphone recording");
        Ok(())
    }

    /// Stop recording, keeping anything not yet drained
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("microphone stopped");
        }
    }

    /// Take every sample recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }

    /// Block for `period`, then drain
    #[must_use]
    pub fn collect(&self, period: Duration) -> Vec<f32> {
        std::thread::sleep(period);
        self.drain()
    }

    /// Name of the microphone
    #[must_use]
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_default()
    }

    /// Rate of the samples returned by [`drain`](Self::drain)
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

/// Append interleaved `data` to `out`, averaging each frame to one sample
fn append_mono(out: &mut Vec<f32>, data: &[f32], channels: u16) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }

    let scale = f32::from(channels).recip();
    out.extend(
        data.chunks_exact(usize::from(channels))
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Scale a float sample to signed 16-bit PCM, clipping out-of-range input
#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Encode mono samples as a 16-bit PCM WAV file for upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let wav_error = |e: hound::Error| Error::Audio(format!("WAV encoding failed: {e}"));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut wav, spec).map_err(wav_error)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample)).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    Ok(wav.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let mut out = Vec::new();
        append_mono(&mut out, &[0.2, 0.4, -1.0, 1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
        assert!((out[2] - 0.5).abs() < 1e-6);

        append_mono(&mut out, &[0.1, 0.2], 1);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_pcm_conversion_clips() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), i16::MAX);
        assert_eq!(to_pcm16(3.5), i16::MAX);
        assert_eq!(to_pcm16(-3.5), -i16::MAX);
    }
}
