//! Error types for Dendrite

use thiserror::Error;

/// Result type alias for Dendrite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Dendrite
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Text-to-speech endpoint answered with a non-success status
    #[error("TTS request failed with status {status}: {body}")]
    TtsStatus {
        /// HTTP status code
        status: u16,
        /// Diagnostic body returned by the service
        body: String,
    },

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// History could not be persisted
    #[error("persist error: {0}")]
    Persist(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
