//! WebRTC voice activity detector.
//!
//! Wraps the libfvad port of the WebRTC GMM detector. Frames are classified
//! in 10 ms slices and the speech probability of a frame is the share of its
//! slices classified as voiced. Loading validates the settings once so a bad
//! configuration fails worker startup instead of the first job.

use roomvox_worker::{EngineError, VadSettings, VoiceActivityDetector};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use webrtc_vad::{SampleRate, Vad, VadMode};

fn default_activation_threshold() -> f32 {
    0.5
}

fn default_min_speech_ms() -> u32 {
    50
}

fn default_min_silence_ms() -> u32 {
    550
}

fn default_max_utterance_ms() -> u32 {
    30_000
}

fn default_sample_rate() -> u32 {
    16_000
}

/// How eagerly non-speech is filtered out. Higher modes reject more noise
/// at the cost of clipping quiet speech.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggressiveness {
    Quality,
    LowBitrate,
    #[default]
    Aggressive,
    VeryAggressive,
}

impl Aggressiveness {
    fn mode(self) -> VadMode {
        match self {
            Aggressiveness::Quality => VadMode::Quality,
            Aggressiveness::LowBitrate => VadMode::LowBitrate,
            Aggressiveness::Aggressive => VadMode::Aggressive,
            Aggressiveness::VeryAggressive => VadMode::VeryAggressive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadOptions {
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f32,
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u32,
    #[serde(default = "default_min_silence_ms")]
    pub min_silence_ms: u32,
    /// Utterances are cut at this length even while speech continues.
    #[serde(default = "default_max_utterance_ms")]
    pub max_utterance_ms: u32,
    /// One of 8000, 16000, 32000 or 48000.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub aggressiveness: Aggressiveness,
}

impl Default for VadOptions {
    fn default() -> Self {
        Self {
            activation_threshold: default_activation_threshold(),
            min_speech_ms: default_min_speech_ms(),
            min_silence_ms: default_min_silence_ms(),
            max_utterance_ms: default_max_utterance_ms(),
            sample_rate: default_sample_rate(),
            aggressiveness: Aggressiveness::default(),
        }
    }
}

fn supported_rate(hz: u32) -> Option<SampleRate> {
    match hz {
        8_000 => Some(SampleRate::Rate8kHz),
        16_000 => Some(SampleRate::Rate16kHz),
        32_000 => Some(SampleRate::Rate32kHz),
        48_000 => Some(SampleRate::Rate48kHz),
        _ => None,
    }
}

/// Owned libfvad instance.
struct Detector(Vad);

// SAFETY: the libfvad state is a heap allocation without thread affinity.
// Every access goes through the owning `Mutex`.
unsafe impl Send for Detector {}

pub struct WebRtcVad {
    settings: VadSettings,
    aggressiveness: Aggressiveness,
    detector: Mutex<Detector>,
}

impl WebRtcVad {
    pub fn load(options: &VadOptions) -> Result<Self, EngineError> {
        let threshold = options.activation_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(EngineError::Config(format!(
                "vad activation_threshold must be between 0 and 1 (exclusive), got {}",
                threshold
            )));
        }
        if supported_rate(options.sample_rate).is_none() {
            return Err(EngineError::Config(format!(
                "vad sample_rate must be 8000, 16000, 32000 or 48000, got {}",
                options.sample_rate
            )));
        }
        if options.min_silence_ms == 0 {
            return Err(EngineError::Config("vad min_silence_ms must be non-zero".into()));
        }
        if options.max_utterance_ms <= options.min_speech_ms {
            return Err(EngineError::Config(format!(
                "vad max_utterance_ms ({}) must exceed min_speech_ms ({})",
                options.max_utterance_ms, options.min_speech_ms
            )));
        }

        let settings = VadSettings {
            activation_threshold: threshold,
            min_speech_ms: options.min_speech_ms,
            min_silence_ms: options.min_silence_ms,
            max_utterance_ms: options.max_utterance_ms,
            sample_rate: options.sample_rate,
        };
        let vad = Self::build(settings, options.aggressiveness).ok_or_else(|| {
            EngineError::Config(format!("unsupported vad sample rate {}", options.sample_rate))
        })?;

        tracing::info!(
            threshold,
            sample_rate = options.sample_rate,
            aggressiveness = ?options.aggressiveness,
            min_speech_ms = options.min_speech_ms,
            min_silence_ms = options.min_silence_ms,
            max_utterance_ms = options.max_utterance_ms,
            "loaded webrtc voice activity detector"
        );
        Ok(vad)
    }

    fn build(settings: VadSettings, aggressiveness: Aggressiveness) -> Option<Self> {
        let rate = supported_rate(settings.sample_rate)?;
        Some(Self {
            settings,
            aggressiveness,
            detector: Mutex::new(Detector(Vad::new_with_rate_and_mode(
                rate,
                aggressiveness.mode(),
            ))),
        })
    }

    pub fn aggressiveness(&self) -> Aggressiveness {
        self.aggressiveness
    }

    /// Samples in one 10 ms slice.
    fn slice_len(&self) -> usize {
        (self.settings.sample_rate / 100) as usize
    }

    fn lock(&self) -> MutexGuard<'_, Detector> {
        match self.detector.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("vad lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl VoiceActivityDetector for WebRtcVad {
    fn settings(&self) -> VadSettings {
        self.settings
    }

    /// Share of the frame's whole 10 ms slices classified as voiced. A
    /// trailing partial slice is ignored, so frames under 10 ms score 0.
    fn speech_probability(&self, frame: &[i16]) -> f32 {
        let slice_len = self.slice_len();
        let slices = frame.len() / slice_len;
        if slices == 0 {
            return 0.0;
        }

        let mut detector = self.lock();
        let voiced = frame
            .chunks_exact(slice_len)
            .filter(|slice| match detector.0.is_voice_segment(slice) {
                Ok(voiced) => voiced,
                Err(()) => {
                    tracing::warn!(len = slice.len(), "vad rejected frame");
                    false
                }
            })
            .count();
        voiced as f32 / slices as f32
    }

    fn fork(&self) -> Option<Box<dyn VoiceActivityDetector>> {
        Self::build(self.settings, self.aggressiveness)
            .map(|vad| Box::new(vad) as Box<dyn VoiceActivityDetector>)
    }
}

impl std::fmt::Debug for WebRtcVad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcVad")
            .field("settings", &self.settings)
            .field("aggressiveness", &self.aggressiveness)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_not_speech() {
        let vad = WebRtcVad::load(&VadOptions::default()).unwrap();
        // 30 ms at 16 kHz.
        assert_eq!(vad.speech_probability(&[0; 480]), 0.0);
        assert!(!vad.is_speech(&[0; 480]));
    }

    #[test]
    fn frames_shorter_than_a_slice_score_zero() {
        let vad = WebRtcVad::load(&VadOptions::default()).unwrap();
        assert_eq!(vad.speech_probability(&[]), 0.0);
        assert_eq!(vad.speech_probability(&[1_000; 159]), 0.0);
    }

    #[test]
    fn unsupported_sample_rate_fails_to_load() {
        for rate in [0, 11_025, 22_050, 44_100] {
            let options = VadOptions {
                sample_rate: rate,
                ..Default::default()
            };
            assert!(
                matches!(WebRtcVad::load(&options), Err(EngineError::Config(_))),
                "rate {}",
                rate
            );
        }
    }

    #[test]
    fn invalid_threshold_fails_to_load() {
        for threshold in [0.0, 1.0, -0.5, f32::NAN] {
            let options = VadOptions {
                activation_threshold: threshold,
                ..Default::default()
            };
            assert!(WebRtcVad::load(&options).is_err(), "threshold {}", threshold);
        }
    }

    #[test]
    fn max_utterance_must_exceed_min_speech() {
        let options = VadOptions {
            min_speech_ms: 500,
            max_utterance_ms: 500,
            ..Default::default()
        };
        assert!(WebRtcVad::load(&options).is_err());
    }

    #[test]
    fn settings_reflect_options() {
        let options = VadOptions {
            min_silence_ms: 300,
            max_utterance_ms: 10_000,
            sample_rate: 8_000,
            aggressiveness: Aggressiveness::VeryAggressive,
            ..Default::default()
        };
        let vad = WebRtcVad::load(&options).unwrap();
        assert_eq!(vad.settings().min_silence_ms, 300);
        assert_eq!(vad.settings().max_utterance_ms, 10_000);
        assert_eq!(vad.settings().sample_rate, 8_000);
        assert_eq!(vad.aggressiveness(), Aggressiveness::VeryAggressive);
        assert_eq!(vad.speech_probability(&[0; 80]), 0.0);
    }

    #[test]
    fn fork_keeps_settings() {
        let vad = WebRtcVad::load(&VadOptions::default()).unwrap();
        let stream = vad.fork().expect("webrtc detector forks per stream");
        assert_eq!(stream.settings(), vad.settings());
        assert_eq!(stream.speech_probability(&[0; 160]), 0.0);
    }

    #[test]
    fn aggressiveness_parses_snake_case() {
        let options: VadOptions =
            serde_json::from_str(r#"{ "aggressiveness": "very_aggressive" }"#).unwrap();
        assert_eq!(options.aggressiveness, Aggressiveness::VeryAggressive);
        assert_eq!(VadOptions::default().aggressiveness, Aggressiveness::Aggressive);
    }
}
