use crate::assemblyai::AssemblyAiStt;
use crate::cartesia::CartesiaTts;
use crate::config::PluginConfig;
use crate::groq::GroqLlm;
use crate::vad::WebRtcVad;
use roomvox_worker::{
    EngineError, EngineProvider, LanguageModel, SpeechToText, TextToSpeech, VoiceActivityDetector,
};
use std::sync::Arc;

/// Production engines: AssemblyAI, Groq, Cartesia and the WebRTC VAD.
///
/// API keys are read from the environment each time an engine is built, so a
/// missing key fails the job that needs it rather than worker startup.
#[derive(Debug, Clone, Default)]
pub struct PluginEngines {
    config: PluginConfig,
}

impl PluginEngines {
    pub fn new(config: PluginConfig) -> Self {
        Self { config }
    }
}

impl EngineProvider for PluginEngines {
    fn load_vad(&self) -> Result<Arc<dyn VoiceActivityDetector>, EngineError> {
        Ok(Arc::new(WebRtcVad::load(&self.config.vad)?))
    }

    fn stt(&self) -> Result<Arc<dyn SpeechToText>, EngineError> {
        Ok(Arc::new(AssemblyAiStt::from_env(self.config.stt.clone())?))
    }

    fn llm(&self, model: &str) -> Result<Arc<dyn LanguageModel>, EngineError> {
        Ok(Arc::new(GroqLlm::from_env(model, &self.config.llm)?))
    }

    fn tts(&self) -> Result<Arc<dyn TextToSpeech>, EngineError> {
        Ok(Arc::new(CartesiaTts::from_env(self.config.tts.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::VadOptions;

    #[test]
    fn load_vad_uses_configured_settings() {
        let engines = PluginEngines::new(PluginConfig {
            vad: VadOptions {
                min_silence_ms: 400,
                ..Default::default()
            },
            ..Default::default()
        });
        let vad = engines.load_vad().unwrap();
        assert_eq!(vad.settings().min_silence_ms, 400);
    }

    #[test]
    fn invalid_vad_config_fails_load() {
        let engines = PluginEngines::new(PluginConfig {
            vad: VadOptions {
                activation_threshold: 2.0,
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(matches!(engines.load_vad(), Err(EngineError::Config(_))));
    }

    #[test]
    fn unsupported_vad_rate_fails_load() {
        let engines = PluginEngines::new(PluginConfig {
            vad: VadOptions {
                sample_rate: 44_100,
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(engines.load_vad().is_err());
    }
}
