//! Conversation loop
//!
//! ```text
//! Init → Greeting → ┬→ WaitForInput → Thinking → Speaking ┐
//!                   │        ↑ miss        │               │
//!                   │        └─────────────┘←──────────────┘
//!                   └→ Terminated (quit / input closed)
//! ```
//!
//! The full history is sent with every completion and written back to the
//! store after every assistant reply.

use rand::seq::SliceRandom;

use crate::chat::{ChatModel, PRIMING_MAX_TOKENS, TURN_MAX_TOKENS};
use crate::history::{HistoryStore, Message};
use crate::input::{Input, InputSource, is_quit};
use crate::voice::SpeechOutput;
use crate::Result;

/// Persona instruction sent before the first user turn
pub const PRIMING_PROMPT: &str = "Your name is Dendrite. Address yourself as such. \
    Limit your responses to a maximum of 200 tokens. \
    If you understand, reply only to this message with a variation of 'Hello'. \
    Don't explicitly say you understand.";

/// Greetings used for a fresh conversation without priming
const GREETINGS: [&str; 3] = ["Hello!", "Hi!", "Hey there!"];

/// Greeting used when resuming a conversation without priming
const RESUME_GREETING: &str = "Hello!";

/// How the assistant opens a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Opening {
    /// Send the persona instruction and speak the model's reply
    #[default]
    Primed,
    /// Speak a canned greeting without calling the model
    Greeting,
    /// Wait for the user straight away
    Silent,
}

/// Conversation options
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantOptions {
    /// Voice mode: wait for each reply to finish playing before listening
    pub voice: bool,
    /// Session opening
    pub opening: Opening,
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Loading history
    Init,
    /// Producing the opening line
    Greeting,
    /// Waiting for the next user turn
    WaitForInput,
    /// Asking the model to answer this user text
    Thinking(String),
    /// Delivering this reply
    Speaking(String),
    /// Session over
    Terminated,
}

/// Drives the conversation between the user, the chat model and speech output
pub struct Assistant<M, I> {
    model: M,
    input: I,
    store: HistoryStore,
    speech: Option<SpeechOutput>,
    options: AssistantOptions,
    history: Vec<Message>,
}

impl<M: ChatModel, I: InputSource> Assistant<M, I> {
    /// Create an assistant
    ///
    /// Without `speech`, replies are only printed.
    #[must_use]
    pub const fn new(
        model: M,
        input: I,
        store: HistoryStore,
        speech: Option<SpeechOutput>,
        options: AssistantOptions,
    ) -> Self {
        Self {
            model,
            input,
            store,
            speech,
            options,
            history: Vec::new(),
        }
    }

    /// Conversation so far
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run until the user quits or input closes
    ///
    /// # Errors
    ///
    /// Returns error if a chat completion fails or the input device fails
    pub async fn run(&mut self) -> Result<()> {
        let mut state = State::Init;

        loop {
            tracing::trace!(?state, "assistant state");

            state = match state {
                State::Init => {
                    self.init();
                    if self.options.opening == Opening::Silent {
                        State::WaitForInput
                    } else {
                        State::Greeting
                    }
                }
                State::Greeting => State::Speaking(self.opening_line().await?),
                State::WaitForInput => match self.input.read().await? {
                    Input::Miss => State::WaitForInput,
                    Input::Closed => State::Terminated,
                    Input::Text(text) if is_quit(&text) => State::Terminated,
                    Input::Text(text) => State::Thinking(text),
                },
                State::Thinking(text) => State::Speaking(self.think(text).await?),
                State::Speaking(reply) => {
                    self.speak(reply).await;
                    State::WaitForInput
                }
                State::Terminated => break,
            };
        }

        if let Some(speech) = &self.speech {
            speech.wait_idle().await;
        }

        tracing::info!(messages = self.history.len(), "conversation ended");
        Ok(())
    }

    fn init(&mut self) {
        self.history = self.store.load();
        tracing::info!(
            path = %self.store.path().display(),
            messages = self.history.len(),
            "loaded conversation history"
        );

        if self.options.opening == Opening::Primed {
            self.history.push(Message::system(PRIMING_PROMPT));
        }
    }

    async fn opening_line(&self) -> Result<String> {
        match self.options.opening {
            Opening::Primed => {
                self.model
                    .complete(&self.history, PRIMING_MAX_TOKENS)
                    .await
            }
            Opening::Greeting | Opening::Silent => {
                Ok(opening_greeting(&self.history).to_string())
            }
        }
    }

    async fn think(&mut self, text: String) -> Result<String> {
        tracing::debug!(input = %text, "user turn");
        self.history.push(Message::user(text));
        println!("Assistant: Thinking...");

        self.model.complete(&self.history, TURN_MAX_TOKENS).await
    }

    async fn speak(&mut self, reply: String) {
        println!("Assistant: {reply}");
        let playback = self.speech.as_ref().map(|speech| speech.speak(&reply));
        self.history.push(Message::assistant(reply));

        if let Err(e) = self.store.save(&self.history) {
            tracing::error!(error = %e, "failed to save conversation history");
        }

        match playback {
            Some(handle) if self.options.voice => {
                if let Err(e) = handle.wait().await {
                    tracing::debug!(error = %e, "reply was not spoken");
                }
            }
            Some(handle) => handle.detach(),
            None => {}
        }
    }
}

/// Pick the canned opening line
///
/// A fresh conversation gets a random greeting, a resumed one a fixed one.
#[must_use]
pub fn opening_greeting(history: &[Message]) -> &'static str {
    if history.is_empty() {
        GREETINGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(RESUME_GREETING)
    } else {
        RESUME_GREETING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_greeting() {
        assert!(GREETINGS.contains(&opening_greeting(&[])));
        assert_eq!(
            opening_greeting(&[Message::user("hi"), Message::assistant("hello")]),
            RESUME_GREETING
        );
    }

    #[test]
    fn test_priming_prompt_sets_persona() {
        assert!(PRIMING_PROMPT.starts_with("Your name is Dendrite."));
        assert!(PRIMING_PROMPT.contains("200 tokens"));
    }
}
