//! Text-to-speech (TTS) via `ElevenLabs`

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::TtsConfig;
use crate::{Error, Result};

/// Turns reply text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` to MPEG audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice_id: String,
    model: Option<String>,
    base_url: String,
}

impl TextToSpeech {
    /// Create a synthesizer from the speech output settings
    ///
    /// # Errors
    ///
    /// Returns error if the API key or voice identifier is empty
    pub fn new(config: &TtsConfig) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }
        if config.voice_id.is_empty() {
            return Err(Error::Config(
                "ElevenLabs voice id required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(config.api_key.expose_secret().to_owned()),
            voice_id: config.voice_id.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Synthesize text to MPEG audio bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::TtsStatus`] when the service answers with a
    /// non-success status, or a transport error if the request fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            model_id: Option<&'a str>,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);

        let request = ElevenLabsRequest {
            text,
            model_id: self.model.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TtsStatus {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("failed to read audio: {e}")))?;
        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Self::synthesize(self, text).await
    }
}
