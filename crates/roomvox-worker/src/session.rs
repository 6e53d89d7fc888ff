//! Session assembly.
//!
//! An [`AgentSession`] pairs the four engines; starting it with an
//! [`Assistant`] in a connected [`Room`] yields a [`LiveSession`] that the
//! room drives until it disconnects.

use crate::audio::AudioBuffer;
use crate::engine::{
    ChatMessage, LanguageModel, SpeechToText, TextToSpeech, VoiceActivityDetector,
};
use crate::error::WorkerError;
use crate::job::{Room, RunningSession};
use crate::turn::SpeechSegmenter;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default behavior instructions for the voice assistant.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful voice AI assistant. \
The user is interacting with you via voice. \
You eagerly assist users with their questions by providing information from your extensive knowledge. \
Your responses are concise, to the point, and without any complex formatting or punctuation \
including emojis, asterisks, or other symbols. \
You are curious, friendly, and have a sense of humor.";

/// Upper bound on retained chat turns; the oldest are dropped first.
pub const MAX_HISTORY_MESSAGES: usize = 40;

/// The assistant role: a fixed instruction string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assistant {
    instructions: String,
}

impl Assistant {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

impl Default for Assistant {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

/// Builder for [`AgentSession`]. All four engines are required.
#[derive(Default)]
pub struct AgentSessionBuilder {
    stt: Option<Arc<dyn SpeechToText>>,
    llm: Option<Arc<dyn LanguageModel>>,
    tts: Option<Arc<dyn TextToSpeech>>,
    vad: Option<Arc<dyn VoiceActivityDetector>>,
}

impl AgentSessionBuilder {
    pub fn stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tts(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    pub fn vad(mut self, vad: Arc<dyn VoiceActivityDetector>) -> Self {
        self.vad = Some(vad);
        self
    }

    pub fn build(self) -> Result<AgentSession, WorkerError> {
        let missing = |name: &str| WorkerError::Config(format!("agent session requires {}", name));
        Ok(AgentSession {
            stt: self.stt.ok_or_else(|| missing("a speech-to-text engine"))?,
            llm: self.llm.ok_or_else(|| missing("a language model"))?,
            tts: self.tts.ok_or_else(|| missing("a text-to-speech engine"))?,
            vad: self.vad.ok_or_else(|| missing("a voice activity detector"))?,
        })
    }
}

/// The four engines a session runs on, not yet bound to a room.
pub struct AgentSession {
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn TextToSpeech>,
    vad: Arc<dyn VoiceActivityDetector>,
}

impl AgentSession {
    pub fn builder() -> AgentSessionBuilder {
        AgentSessionBuilder::default()
    }

    /// Binds the session to `agent` and starts it in `room`.
    pub async fn start(
        self,
        agent: Assistant,
        room: &dyn Room,
    ) -> Result<RunningSession, WorkerError> {
        let live = Arc::new(LiveSession {
            id: Uuid::new_v4().to_string(),
            agent,
            stt: self.stt,
            llm: self.llm,
            tts: self.tts,
            vad: self.vad,
            history: Mutex::new(Vec::new()),
        });
        tracing::debug!(
            session_id = %live.id,
            room = room.name(),
            stt = live.stt.provider(),
            llm = live.llm.model(),
            tts = live.tts.provider(),
            "starting agent session"
        );
        room.start_session(live).await
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("stt", &self.stt.provider())
            .field("llm", &self.llm.model())
            .field("tts", &self.tts.provider())
            .field("vad", &self.vad.settings())
            .finish()
    }
}

/// A session bound to an assistant, driven by the room hosting it.
pub struct LiveSession {
    id: String,
    agent: Assistant,
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn TextToSpeech>,
    vad: Arc<dyn VoiceActivityDetector>,
    history: Mutex<Vec<ChatMessage>>,
}

impl LiveSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &Assistant {
        &self.agent
    }

    pub fn vad(&self) -> &Arc<dyn VoiceActivityDetector> {
        &self.vad
    }

    /// Sample rate of the audio produced by [`respond`](Self::respond).
    pub fn output_sample_rate(&self) -> u32 {
        self.tts.sample_rate()
    }

    /// A turn segmenter driven by this session's detector.
    pub fn segmenter(&self) -> SpeechSegmenter {
        SpeechSegmenter::new(self.vad.clone())
    }

    /// Answers one user utterance.
    ///
    /// Returns `None` when the utterance transcribes to nothing.
    pub async fn respond(
        &self,
        utterance: &AudioBuffer,
    ) -> Result<Option<AudioBuffer>, WorkerError> {
        let transcript = self.stt.transcribe(utterance).await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::debug!(session_id = %self.id, "empty transcript, skipping turn");
            return Ok(None);
        }
        self.reply_to_text(transcript).await.map(Some)
    }

    /// Runs one assistant turn for an already-transcribed user message.
    pub async fn reply_to_text(&self, text: &str) -> Result<AudioBuffer, WorkerError> {
        // Held for the whole turn so concurrent utterances are answered in order.
        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(text));

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.agent.instructions()));
        messages.extend(history.iter().cloned());

        let reply = match self.llm.chat(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                // Keep user/assistant turns paired.
                history.pop();
                return Err(e.into());
            }
        };
        history.push(ChatMessage::assistant(reply.clone()));
        if history.len() > MAX_HISTORY_MESSAGES {
            let excess = history.len() - MAX_HISTORY_MESSAGES;
            history.drain(..excess);
        }
        drop(history);

        tracing::debug!(
            session_id = %self.id,
            chars = reply.len(),
            "assistant reply generated"
        );
        Ok(self.tts.synthesize(&reply).await?)
    }

    /// Snapshot of the conversation so far (without the system message).
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("id", &self.id)
            .field("agent", &self.agent)
            .finish_non_exhaustive()
    }
}
