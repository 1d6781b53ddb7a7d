//! Configuration management for Dendrite

use std::path::PathBuf;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default file the conversation history is persisted to
pub const DEFAULT_HISTORY_FILE: &str = "conversation_history.json";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "gpt-4";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default `OpenAI` API origin (chat and transcription)
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default `ElevenLabs` API origin (speech synthesis)
pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Dendrite configuration, built once at startup
#[derive(Debug)]
pub struct Config {
    /// `OpenAI` API key (chat completion and Whisper transcription)
    pub openai_api_key: SecretString,

    /// `OpenAI` API origin, overridable for compatible gateways
    pub openai_base_url: String,

    /// Chat model identifier
    pub llm_model: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Speech output settings; `None` when no TTS credentials are configured
    pub tts: Option<TtsConfig>,

    /// Conversation history file
    pub history_path: PathBuf,

    /// Directory holding the temporary playback file
    pub scratch_dir: PathBuf,
}

/// `ElevenLabs` speech synthesis settings
#[derive(Debug)]
pub struct TtsConfig {
    /// `ElevenLabs` API key
    pub api_key: SecretString,

    /// Voice identifier
    pub voice_id: String,

    /// Optional model override (e.g. `eleven_monolingual_v1`)
    pub model: Option<String>,

    /// API origin
    pub base_url: String,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is read first when present.
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup
    ///
    /// Values are trimmed and empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = var("OPENAI_API_KEY")
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;

        let tts = match (var("ELEVEN_LABS_KEY"), var("ELEVEN_LABS_VOICE_ID")) {
            (Some(api_key), Some(voice_id)) => Some(TtsConfig {
                api_key: SecretString::from(api_key),
                voice_id,
                model: var("DENDRITE_TTS_MODEL"),
                base_url: var("ELEVEN_LABS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ELEVENLABS_BASE_URL.to_string()),
            }),
            (key, voice) => {
                tracing::warn!(
                    has_key = key.is_some(),
                    has_voice = voice.is_some(),
                    "ELEVEN_LABS_KEY and ELEVEN_LABS_VOICE_ID required for speech output, replies will not be spoken"
                );
                None
            }
        };

        Ok(Self {
            openai_api_key: SecretString::from(openai_api_key),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            llm_model: var("DENDRITE_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            stt_model: var("DENDRITE_STT_MODEL").unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts,
            history_path: var("DENDRITE_HISTORY")
                .map_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE), PathBuf::from),
            scratch_dir: var("DENDRITE_SCRATCH_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_missing_openai_key_is_an_error() {
        assert!(matches!(load(&[]), Err(Error::Config(_))));
        assert!(matches!(
            load(&[("OPENAI_API_KEY", "   ")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("OPENAI_API_KEY", " sk-test \n")]).unwrap();

        assert_eq!(config.openai_api_key.expose_secret(), "sk-test");
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.llm_model, "gpt-4");
        assert_eq!(config.stt_model, "whisper-1");
        assert_eq!(config.history_path, PathBuf::from("conversation_history.json"));
        assert_eq!(config.scratch_dir, PathBuf::from("."));
        assert!(config.tts.is_none());
    }

    #[test]
    fn test_tts_needs_key_and_voice() {
        let key_only = load(&[("OPENAI_API_KEY", "sk"), ("ELEVEN_LABS_KEY", "xi")]).unwrap();
        assert!(key_only.tts.is_none());

        let voice_only = load(&[("OPENAI_API_KEY", "sk"), ("ELEVEN_LABS_VOICE_ID", "v")]).unwrap();
        assert!(voice_only.tts.is_none());

        let blank_voice = load(&[
            ("OPENAI_API_KEY", "sk"),
            ("ELEVEN_LABS_KEY", "xi"),
            ("ELEVEN_LABS_VOICE_ID", ""),
        ])
        .unwrap();
        assert!(blank_voice.tts.is_none());

        let both = load(&[
            ("OPENAI_API_KEY", "sk"),
            ("ELEVEN_LABS_KEY", "xi"),
            ("ELEVEN_LABS_VOICE_ID", "voice-1"),
        ])
        .unwrap();
        let tts = both.tts.unwrap();
        assert_eq!(tts.api_key.expose_secret(), "xi");
        assert_eq!(tts.voice_id, "voice-1");
        assert_eq!(tts.model, None);
        assert_eq!(tts.base_url, DEFAULT_ELEVENLABS_BASE_URL);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk"),
            ("OPENAI_BASE_URL", "http://127.0.0.1:9000"),
            ("DENDRITE_LLM_MODEL", "gpt-4o-mini"),
            ("DENDRITE_STT_MODEL", ""),
            ("DENDRITE_HISTORY", "/tmp/chat.json"),
            ("DENDRITE_SCRATCH_DIR", "/tmp"),
            ("ELEVEN_LABS_KEY", "xi"),
            ("ELEVEN_LABS_VOICE_ID", "voice-1"),
            ("DENDRITE_TTS_MODEL", "eleven_monolingual_v1"),
        ])
        .unwrap();

        assert_eq!(config.openai_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.llm_model, "gpt-4o-mini");
        assert_eq!(config.stt_model, "whisper-1");
        assert_eq!(config.history_path, PathBuf::from("/tmp/chat.json"));
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp"));
        assert_eq!(
            config.tts.unwrap().model.as_deref(),
            Some("eleven_monolingual_v1")
        );
    }
}
