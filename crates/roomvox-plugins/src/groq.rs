//! Groq language model over its OpenAI-compatible chat completions API.

use crate::http;
use async_trait::async_trait;
use roomvox_worker::{ChatMessage, EngineError, LanguageModel};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENGINE: &str = "groq";

pub const API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqOptions {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sampling temperature; the provider default when unset.
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for GroqOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            temperature: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct GroqLlm {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl GroqLlm {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        options: &GroqOptions,
    ) -> Result<Self, EngineError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(EngineError::Config("groq model id must not be empty".into()));
        }
        let timeout = Duration::from_secs(options.timeout_seconds);
        Ok(Self {
            client: http::client(ENGINE, timeout)?,
            base_url: http::trim_base_url(&options.base_url),
            api_key: api_key.into(),
            model,
            temperature: options.temperature,
            timeout,
        })
    }

    /// Reads the API key from `GROQ_API_KEY`.
    pub fn from_env(model: impl Into<String>, options: &GroqOptions) -> Result<Self, EngineError> {
        Self::new(http::api_key_from_env(API_KEY_ENV)?, model, options)
    }
}

#[async_trait]
impl LanguageModel for GroqLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, EngineError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;
        let response = http::ensure_success(ENGINE, response).await?;
        let completion: CompletionResponse = http::decode_json(ENGINE, response).await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngineError::Decode {
                engine: ENGINE,
                reason: "completion has no message content".into(),
            })
    }
}

impl std::fmt::Debug for GroqLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqLlm")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: DEFAULT_MODEL,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama-3.1-8b-instant");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = GroqLlm::new("key", " ", &GroqOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let llm = GroqLlm::new("gsk_secret", DEFAULT_MODEL, &GroqOptions::default()).unwrap();
        let debug = format!("{:?}", llm);
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
