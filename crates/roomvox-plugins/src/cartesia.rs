//! Cartesia text-to-speech via the `/tts/bytes` endpoint.

use crate::http;
use async_trait::async_trait;
use roomvox_worker::{AudioBuffer, EngineError, TextToSpeech};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENGINE: &str = "cartesia";

/// Maximum text input size for one synthesis request (64 KiB).
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

pub const API_KEY_ENV: &str = "CARTESIA_API_KEY";
pub const API_VERSION: &str = "2024-06-10";
pub const DEFAULT_BASE_URL: &str = "https://api.cartesia.ai";
pub const DEFAULT_MODEL: &str = "sonic-2";
pub const DEFAULT_VOICE: &str = "794f9389-aac1-45b6-b726-9d9369183238";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesiaOptions {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for CartesiaOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            voice: default_voice(),
            language: default_language(),
            sample_rate: default_sample_rate(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Serialize)]
struct BytesRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: VoiceSpec<'a>,
    output_format: OutputFormat,
    language: &'a str,
}

#[derive(Serialize)]
struct VoiceSpec<'a> {
    mode: &'static str,
    id: &'a str,
}

#[derive(Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

pub struct CartesiaTts {
    client: reqwest::Client,
    api_key: String,
    options: CartesiaOptions,
    timeout: Duration,
}

impl CartesiaTts {
    pub fn new(api_key: impl Into<String>, options: CartesiaOptions) -> Result<Self, EngineError> {
        if options.sample_rate == 0 {
            return Err(EngineError::Config("cartesia sample rate must be non-zero".into()));
        }
        let timeout = Duration::from_secs(options.timeout_seconds);
        Ok(Self {
            client: http::client(ENGINE, timeout)?,
            api_key: api_key.into(),
            options: CartesiaOptions {
                base_url: http::trim_base_url(&options.base_url),
                ..options
            },
            timeout,
        })
    }

    /// Reads the API key from `CARTESIA_API_KEY`.
    pub fn from_env(options: CartesiaOptions) -> Result<Self, EngineError> {
        Self::new(http::api_key_from_env(API_KEY_ENV)?, options)
    }

    fn request_body<'a>(&'a self, text: &'a str) -> BytesRequest<'a> {
        BytesRequest {
            model_id: &self.options.model,
            transcript: text,
            voice: VoiceSpec {
                mode: "id",
                id: &self.options.voice,
            },
            output_format: OutputFormat {
                container: "raw",
                encoding: "pcm_s16le",
                sample_rate: self.options.sample_rate,
            },
            language: &self.options.language,
        }
    }
}

#[async_trait]
impl TextToSpeech for CartesiaTts {
    fn provider(&self) -> &str {
        ENGINE
    }

    fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }

    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, EngineError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(EngineError::Failed {
                engine: ENGINE,
                reason: format!(
                    "text exceeds maximum size: {} bytes (limit: {} bytes)",
                    text.len(),
                    MAX_TTS_INPUT_BYTES
                ),
            });
        }
        if text.trim().is_empty() {
            return Ok(AudioBuffer::mono(Vec::new(), self.options.sample_rate));
        }

        let response = self
            .client
            .post(format!("{}/tts/bytes", self.options.base_url))
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", API_VERSION)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;
        let response = http::ensure_success(ENGINE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;

        Ok(AudioBuffer::from_le_bytes(&bytes, self.options.sample_rate, 1))
    }
}

impl std::fmt::Debug for CartesiaTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartesiaTts")
            .field("options", &self.options)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
