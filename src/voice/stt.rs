//! Speech-to-text (STT) via the `OpenAI` transcription API

use secrecy::{ExposeSecret, SecretString};

use crate::{Config, Error, Result};

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl SpeechToText {
    /// Create a transcriber from the loaded configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            SecretString::from(config.openai_api_key.expose_secret().to_owned()),
            &config.openai_base_url,
            &config.stt_model,
        )
    }

    /// Create a transcriber against an explicit API origin
    #[must_use]
    pub fn with_endpoint(api_key: SecretString, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// An empty string means the service heard nothing it could map to words.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("request failed: {e}")))?;

        let status = response.status();
        tracing::debug!(status = %status, "received transcription response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse response: {e}")))?;

        let text = result.text.trim().to_string();
        tracing::debug!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
