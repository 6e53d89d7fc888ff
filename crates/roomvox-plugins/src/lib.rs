//! Engine adapters for roomvox voice agents.
//!
//! - [`AssemblyAiStt`]: speech-to-text
//! - [`GroqLlm`]: chat completions
//! - [`CartesiaTts`]: text-to-speech
//! - [`WebRtcVad`]: voice activity detection
//!
//! [`PluginEngines`] bundles them behind [`roomvox_worker::EngineProvider`].

pub mod assemblyai;
pub mod cartesia;
pub mod config;
pub mod groq;
mod http;
pub mod provider;
pub mod vad;

pub use assemblyai::{AssemblyAiOptions, AssemblyAiStt};
pub use cartesia::{CartesiaOptions, CartesiaTts};
pub use config::PluginConfig;
pub use groq::{GroqLlm, GroqOptions};
pub use provider::PluginEngines;
pub use vad::{Aggressiveness, VadOptions, WebRtcVad};
