//! `[plugins]` configuration section.

use crate::assemblyai::AssemblyAiOptions;
use crate::cartesia::CartesiaOptions;
use crate::groq::GroqOptions;
use crate::vad::VadOptions;
use serde::{Deserialize, Serialize};

/// Per-engine options. Every field has a default, so an absent or partial
/// `[plugins]` table is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub stt: AssemblyAiOptions,
    #[serde(default)]
    pub llm: GroqOptions,
    #[serde(default)]
    pub tts: CartesiaOptions,
    #[serde(default)]
    pub vad: VadOptions,
}
