//! AssemblyAI speech-to-text: upload, create transcript, poll.

use crate::http;
use async_trait::async_trait;
use roomvox_worker::{AudioBuffer, EngineError, SpeechToText};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::Instant;

const ENGINE: &str = "assemblyai";

/// Maximum encoded audio size for one transcription (10 MiB).
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

pub const API_KEY_ENV: &str = "ASSEMBLYAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyAiOptions {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language_code: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for upload + transcription of one utterance.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for AssemblyAiOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language_code: default_language(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    id: String,
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Encodes `audio` as a 16-bit PCM WAV file.
pub fn encode_wav(audio: &AudioBuffer) -> Result<Vec<u8>, EngineError> {
    let spec = hound::WavSpec {
        channels: audio.channels.max(1),
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| EngineError::Failed {
        engine: ENGINE,
        reason: format!("failed to encode WAV: {}", e),
    };

    let mut bytes = Vec::with_capacity(44 + audio.samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).map_err(wav_error)?;
        for sample in &audio.samples {
            writer.write_sample(*sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(bytes)
}

pub struct AssemblyAiStt {
    client: reqwest::Client,
    api_key: String,
    options: AssemblyAiOptions,
    timeout: Duration,
}

impl AssemblyAiStt {
    pub fn new(api_key: impl Into<String>, options: AssemblyAiOptions) -> Result<Self, EngineError> {
        let timeout = Duration::from_secs(options.timeout_seconds);
        Ok(Self {
            client: http::client(ENGINE, timeout)?,
            api_key: api_key.into(),
            options: AssemblyAiOptions {
                base_url: http::trim_base_url(&options.base_url),
                ..options
            },
            timeout,
        })
    }

    /// Reads the API key from `ASSEMBLYAI_API_KEY`.
    pub fn from_env(options: AssemblyAiOptions) -> Result<Self, EngineError> {
        Self::new(http::api_key_from_env(API_KEY_ENV)?, options)
    }

    async fn upload(&self, wav: Vec<u8>) -> Result<String, EngineError> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.options.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(wav)
            .send()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;
        let response = http::ensure_success(ENGINE, response).await?;
        let upload: UploadResponse = http::decode_json(ENGINE, response).await?;
        Ok(upload.upload_url)
    }

    async fn create_transcript(&self, audio_url: &str) -> Result<Transcript, EngineError> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.options.base_url))
            .header("authorization", &self.api_key)
            .json(&TranscriptRequest {
                audio_url,
                language_code: &self.options.language_code,
            })
            .send()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;
        let response = http::ensure_success(ENGINE, response).await?;
        http::decode_json(ENGINE, response).await
    }

    async fn fetch_transcript(&self, id: &str) -> Result<Transcript, EngineError> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.options.base_url, id))
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| http::request_error(ENGINE, self.timeout, e))?;
        let response = http::ensure_success(ENGINE, response).await?;
        http::decode_json(ENGINE, response).await
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiStt {
    fn provider(&self) -> &str {
        ENGINE
    }

    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, EngineError> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        let wav = encode_wav(audio)?;
        if wav.len() > MAX_STT_INPUT_BYTES {
            return Err(EngineError::Failed {
                engine: ENGINE,
                reason: format!(
                    "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                    wav.len(),
                    MAX_STT_INPUT_BYTES
                ),
            });
        }

        let deadline = Instant::now() + self.timeout;
        let audio_url = self.upload(wav).await?;
        let mut transcript = self.create_transcript(&audio_url).await?;
        let poll = Duration::from_millis(self.options.poll_interval_ms.max(1));

        loop {
            match transcript.status.as_str() {
                "completed" => return Ok(transcript.text.unwrap_or_default()),
                "error" => {
                    return Err(EngineError::Failed {
                        engine: ENGINE,
                        reason: transcript
                            .error
                            .unwrap_or_else(|| "transcription failed".to_string()),
                    })
                }
                status => {
                    tracing::trace!(transcript_id = %transcript.id, status, "transcript pending");
                }
            }
            if Instant::now() + poll > deadline {
                return Err(EngineError::Timeout {
                    engine: ENGINE,
                    seconds: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(poll).await;
            transcript = self.fetch_transcript(&transcript.id).await?;
        }
    }
}

impl std::fmt::Debug for AssemblyAiStt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyAiStt")
            .field("options", &self.options)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
