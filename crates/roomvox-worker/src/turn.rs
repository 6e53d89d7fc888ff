//! Utterance segmentation driven by a voice-activity detector.

use crate::audio::AudioBuffer;
use crate::engine::{VadSettings, VoiceActivityDetector};
use std::sync::Arc;

/// Cuts a stream of mono frames into utterances.
///
/// An utterance is emitted once at least `min_speech_ms` of speech has been
/// followed by `min_silence_ms` of silence, or once it reaches
/// `max_utterance_ms` (0 disables the cap). Speech bursts shorter than
/// `min_speech_ms` are discarded.
pub struct SpeechSegmenter {
    vad: Arc<dyn VoiceActivityDetector>,
    settings: VadSettings,
    pending: Vec<i16>,
    speech_samples: u64,
    silence_samples: u64,
}

impl SpeechSegmenter {
    /// Uses a per-stream fork of `vad` when the detector offers one.
    pub fn new(vad: Arc<dyn VoiceActivityDetector>) -> Self {
        let vad = vad.fork().map(Arc::from).unwrap_or(vad);
        let settings = vad.settings();
        Self {
            vad,
            settings,
            pending: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    fn samples_for(&self, ms: u32) -> u64 {
        u64::from(ms) * u64::from(self.settings.sample_rate) / 1000
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    /// True while an utterance is being collected.
    pub fn in_speech(&self) -> bool {
        self.speech_samples > 0
    }

    /// Feeds one frame; returns a finished utterance, if any.
    pub fn push_frame(&mut self, frame: &[i16]) -> Option<AudioBuffer> {
        if frame.is_empty() {
            return None;
        }

        let speech = self.vad.is_speech(frame);
        if !speech && self.pending.is_empty() {
            return None;
        }

        // Trailing silence stays in the utterance so words are not clipped.
        self.pending.extend_from_slice(frame);
        if speech {
            self.speech_samples += frame.len() as u64;
            self.silence_samples = 0;
        } else {
            self.silence_samples += frame.len() as u64;
            if self.silence_samples >= self.samples_for(self.settings.min_silence_ms) {
                return self.take_utterance();
            }
        }

        let cap = self.samples_for(self.settings.max_utterance_ms);
        if cap > 0 && self.pending.len() as u64 >= cap {
            tracing::debug!(
                samples = self.pending.len(),
                max_utterance_ms = self.settings.max_utterance_ms,
                "utterance reached maximum length, cutting"
            );
            return self.take_utterance();
        }
        None
    }

    /// Ends the stream; returns the pending utterance if it is long enough.
    pub fn flush(&mut self) -> Option<AudioBuffer> {
        if self.pending.is_empty() {
            return None;
        }
        self.take_utterance()
    }

    fn take_utterance(&mut self) -> Option<AudioBuffer> {
        let long_enough = self.speech_samples >= self.samples_for(self.settings.min_speech_ms);
        let samples = std::mem::take(&mut self.pending);
        self.speech_samples = 0;
        self.silence_samples = 0;
        long_enough.then(|| AudioBuffer::mono(samples, self.settings.sample_rate))
    }
}

impl std::fmt::Debug for SpeechSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechSegmenter")
            .field("settings", &self.settings)
            .field("pending", &self.pending.len())
            .finish()
    }
}
