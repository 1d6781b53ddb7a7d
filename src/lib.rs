//! Dendrite - a voice or text conversational assistant
//!
//! User turns are read from the keyboard or the microphone, sent with the
//! whole conversation to a hosted chat model, and the replies are printed,
//! spoken in the background and persisted to a JSON history file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Assistant                        │
//! │  Init → Greeting → WaitForInput ⇄ Thinking ⇄ Speaking   │
//! └─────┬───────────────────┬───────────────────┬───────────┘
//!       │                   │                   │
//! ┌─────▼────────┐   ┌──────▼───────┐   ┌───────▼───────────┐
//! │ HistoryStore │   │  ChatModel   │   │ Voice             │
//! │  JSON file   │   │   OpenAI     │   │  STT in, TTS out  │
//! └──────────────┘   └──────────────┘   └───────────────────┘
//! ```

pub mod assistant;
pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod voice;

pub use assistant::{Assistant, AssistantOptions, Opening, State};
pub use chat::{ChatClient, ChatModel};
pub use config::{Config, TtsConfig};
pub use error::{Error, Result};
pub use history::{HistoryStore, Message, Role};
pub use input::{Input, InputSource, KeyboardInput};
