//! Chat completion client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::history::Message;
use crate::{Config, Error, Result};

/// Sampling temperature used for every completion
pub const TEMPERATURE: f32 = 0.8;

/// Output token ceiling for a regular turn
pub const TURN_MAX_TOKENS: u32 = 150;

/// Output token ceiling for the persona priming exchange
pub const PRIMING_MAX_TOKENS: u32 = 300;

/// Produces the next assistant reply for a conversation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation with a single assistant reply
    ///
    /// # Errors
    ///
    /// Returns error if the completion cannot be obtained
    async fn complete(&self, messages: &[Message], max_tokens: u32) -> Result<String>;
}

/// `OpenAI` chat completions client
pub struct ChatClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl ChatClient {
    /// Create a client from the loaded configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            SecretString::from(config.openai_api_key.expose_secret().to_owned()),
            &config.openai_base_url,
            &config.llm_model,
        )
    }

    /// Create a client against an explicit API origin
    #[must_use]
    pub fn with_endpoint(api_key: SecretString, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    n: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[Message], max_tokens: u32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
            n: 1,
            temperature: TEMPERATURE,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens,
            "requesting chat completion"
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(Error::Chat(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Chat("response contained no completion".to_string()))?;

        let reply = reply.trim().to_string();
        tracing::debug!(reply_len = reply.len(), "chat completion received");
        Ok(reply)
    }
}
