//! Engine seams.
//!
//! Speech-to-text, language model, text-to-speech and voice-activity
//! detection are external collaborators. The worker only talks to them
//! through these traits; concrete adapters live in `roomvox-plugins`.

use crate::audio::AudioBuffer;
use crate::error::EngineError;
use async_trait::async_trait;
use std::sync::Arc;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider label used in logs.
    fn provider(&self) -> &str;

    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, EngineError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, EngineError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn provider(&self) -> &str;

    /// Sample rate of the audio returned by `synthesize`.
    fn sample_rate(&self) -> u32;

    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, EngineError>;
}

/// Turn-detection parameters a detector was loaded with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadSettings {
    /// Probability above which a frame counts as speech, in (0, 1).
    pub activation_threshold: f32,
    /// Minimum speech duration before an utterance can start.
    pub min_speech_ms: u32,
    /// Silence duration that ends an utterance.
    pub min_silence_ms: u32,
    /// Length at which an utterance is cut even while speech continues.
    pub max_utterance_ms: u32,
    /// Sample rate the detector expects its frames in.
    pub sample_rate: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            activation_threshold: 0.5,
            min_speech_ms: 50,
            min_silence_ms: 550,
            max_utterance_ms: 30_000,
            sample_rate: 16_000,
        }
    }
}

/// Frame-level speech detector. Loaded once per process and shared.
pub trait VoiceActivityDetector: Send + Sync {
    fn settings(&self) -> VadSettings;

    /// Probability in `[0, 1]` that `frame` (mono, `settings().sample_rate`)
    /// contains speech.
    fn speech_probability(&self, frame: &[i16]) -> f32;

    fn is_speech(&self, frame: &[i16]) -> bool {
        self.speech_probability(frame) >= self.settings().activation_threshold
    }

    /// A detector of its own for one audio stream. Stateful detectors return
    /// a fresh instance so concurrent streams do not share adaptation state;
    /// `None` means the shared instance is used as is.
    fn fork(&self) -> Option<Box<dyn VoiceActivityDetector>> {
        None
    }
}

/// Builds engine instances for the voice agent.
///
/// `load_vad` is called once per process from prewarm; the other
/// constructors are called once per job.
pub trait EngineProvider: Send + Sync {
    fn load_vad(&self) -> Result<Arc<dyn VoiceActivityDetector>, EngineError>;

    fn stt(&self) -> Result<Arc<dyn SpeechToText>, EngineError>;

    fn llm(&self, model: &str) -> Result<Arc<dyn LanguageModel>, EngineError>;

    fn tts(&self) -> Result<Arc<dyn TextToSpeech>, EngineError>;
}
