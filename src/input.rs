//! User input sources

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

use crate::Result;

/// Literal input that ends the conversation (case-insensitive)
pub const QUIT_COMMAND: &str = "quit";

/// One attempt at reading user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The user said or typed something
    Text(String),
    /// Nothing usable was captured, ask again
    Miss,
    /// The input source is exhausted
    Closed,
}

impl Input {
    /// Whether this input is the quit command
    #[must_use]
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Text(text) if is_quit(text))
    }
}

/// Check `text` against the quit command
///
/// Surrounding whitespace and punctuation are ignored, transcribers tend to
/// return a lone word as `Quit.`
#[must_use]
pub fn is_quit(text: &str) -> bool {
    text.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .eq_ignore_ascii_case(QUIT_COMMAND)
}

/// Where user turns come from
#[async_trait]
pub trait InputSource: Send {
    /// Read the next user input
    ///
    /// # Errors
    ///
    /// Returns error if the underlying device fails
    async fn read(&mut self) -> Result<Input>;
}

/// Reads user turns line by line, prompting with `You: `
///
/// Lines are trimmed. A blank line is reported as [`Input::Miss`] and never
/// reaches the model.
pub struct KeyboardInput<R> {
    lines: tokio::io::Lines<R>,
    prompt: bool,
}

impl KeyboardInput<BufReader<Stdin>> {
    /// Read from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: true,
        }
    }
}

impl<R: AsyncBufRead + Unpin> KeyboardInput<R> {
    /// Read from any buffered reader without printing a prompt
    #[must_use]
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            prompt: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InputSource for KeyboardInput<R> {
    async fn read(&mut self) -> Result<Input> {
        if self.prompt {
            print!("You: ");
            std::io::stdout().flush()?;
        }

        match self.lines.next_line().await? {
            Some(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    Ok(Input::Miss)
                } else {
                    Ok(Input::Text(line))
                }
            }
            None => {
                tracing::debug!("input closed");
                Ok(Input::Closed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_is_case_insensitive() {
        assert!(is_quit("quit"));
        assert!(is_quit("Quit"));
        assert!(is_quit("QUIT"));
        assert!(is_quit("  quit \n"));
        assert!(is_quit("Quit."));
        assert!(is_quit("quit!"));
        assert!(is_quit(" \"Quit?\" "));
        assert!(!is_quit("quitting"));
        assert!(!is_quit("q.u.i.t"));
        assert!(!is_quit("please quit"));
        assert!(Input::Text("QuIt".to_string()).is_quit());
        assert!(!Input::Miss.is_quit());
    }

    #[tokio::test]
    async fn test_keyboard_reads_lines_then_closes() {
        let mut input = KeyboardInput::from_reader(&b"Hello\n\n  there  \n"[..]);

        assert_eq!(input.read().await.unwrap(), Input::Text("Hello".to_string()));
        assert_eq!(input.read().await.unwrap(), Input::Miss);
        assert_eq!(input.read().await.unwrap(), Input::Text("there".to_string()));
        assert_eq!(input.read().await.unwrap(), Input::Closed);
    }
}
