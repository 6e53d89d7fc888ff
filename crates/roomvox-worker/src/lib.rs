//! Job worker runtime for roomvox voice agents.
//!
//! A worker owns one [`JobProcess`] and invokes three hooks on a
//! [`JobHandler`]:
//!
//! | Hook | When |
//! |------|------|
//! | `prewarm` | once, before any job is offered |
//! | `on_request` | for every job offer; must accept or reject it |
//! | `entrypoint` | for every accepted job, concurrently across rooms |
//!
//! Room transport and the speech/LLM/TTS/VAD engines are external; they are
//! reached through [`RoomConnector`]/[`Room`] and the traits in [`engine`].
//! The [`RoomAdmission`] set keeps a process from running two agents in
//! the same room.

pub mod admission;
pub mod audio;
pub mod engine;
pub mod error;
pub mod job;
pub mod process;
pub mod session;
pub mod turn;
pub mod worker;

pub use admission::{Admission, AdmissionGuard, RoomAdmission};
pub use audio::AudioBuffer;
pub use engine::{
    ChatMessage, ChatRole, EngineProvider, LanguageModel, SpeechToText, TextToSpeech, VadSettings,
    VoiceActivityDetector,
};
pub use error::{EngineError, WorkerError};
pub use job::{JobContext, JobDecision, JobRequest, Room, RoomConnector, RunningSession};
pub use process::{JobProcess, Userdata};
pub use session::{AgentSession, AgentSessionBuilder, Assistant, LiveSession, DEFAULT_INSTRUCTIONS};
pub use turn::SpeechSegmenter;
pub use worker::{Dispatch, JobHandler, Worker, WorkerHandle, WorkerOptions};
