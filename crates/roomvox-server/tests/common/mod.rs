#![allow(dead_code)]

use async_trait::async_trait;
use roomvox_worker::{
    AudioBuffer, ChatMessage, EngineError, EngineProvider, LanguageModel, LiveSession, Room,
    RoomConnector, RunningSession, SpeechToText, TextToSpeech, VadSettings,
    VoiceActivityDetector, WorkerError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct EchoStt;

#[async_trait]
impl SpeechToText for EchoStt {
    fn provider(&self) -> &str {
        "echo"
    }

    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, EngineError> {
        Ok(format!("{} samples", audio.samples.len()))
    }
}

#[derive(Default)]
pub struct RecordingLlm {
    pub model: String,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl LanguageModel for RecordingLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, EngineError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok("sure thing".to_string())
    }
}

pub struct ToneTts;

#[async_trait]
impl TextToSpeech for ToneTts {
    fn provider(&self) -> &str {
        "tone"
    }

    fn sample_rate(&self) -> u32 {
        24_000
    }

    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, EngineError> {
        Ok(AudioBuffer::mono(vec![1; text.len()], 24_000))
    }
}

pub struct ThresholdVad;

impl VoiceActivityDetector for ThresholdVad {
    fn settings(&self) -> VadSettings {
        VadSettings::default()
    }

    fn speech_probability(&self, frame: &[i16]) -> f32 {
        if frame.iter().any(|s| *s != 0) {
            1.0
        } else {
            0.0
        }
    }
}

/// Engine provider that records which LLM model was requested.
#[derive(Default)]
pub struct MockEngines {
    pub fail_vad: bool,
    pub vad_loads: Mutex<u32>,
    pub llm_models: Mutex<Vec<String>>,
    pub last_llm: Mutex<Option<Arc<RecordingLlm>>>,
}

impl MockEngines {
    pub fn failing_vad() -> Self {
        Self {
            fail_vad: true,
            ..Default::default()
        }
    }
}

impl EngineProvider for MockEngines {
    fn load_vad(&self) -> Result<Arc<dyn VoiceActivityDetector>, EngineError> {
        *self.vad_loads.lock().unwrap() += 1;
        if self.fail_vad {
            return Err(EngineError::Config("model weights missing".into()));
        }
        Ok(Arc::new(ThresholdVad))
    }

    fn stt(&self) -> Result<Arc<dyn SpeechToText>, EngineError> {
        Ok(Arc::new(EchoStt))
    }

    fn llm(&self, model: &str) -> Result<Arc<dyn LanguageModel>, EngineError> {
        self.llm_models.lock().unwrap().push(model.to_string());
        let llm = Arc::new(RecordingLlm {
            model: model.to_string(),
            ..Default::default()
        });
        *self.last_llm.lock().unwrap() = Some(llm.clone());
        Ok(llm)
    }

    fn tts(&self) -> Result<Arc<dyn TextToSpeech>, EngineError> {
        Ok(Arc::new(ToneTts))
    }
}

/// A room whose session lasts until [`MockConnector::disconnect`] is called.
pub struct MockRoom {
    name: String,
    fail_start: bool,
    disconnected: watch::Receiver<bool>,
    sessions: Arc<Mutex<Vec<Arc<LiveSession>>>>,
}

#[async_trait]
impl Room for MockRoom {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_session(&self, session: Arc<LiveSession>) -> Result<RunningSession, WorkerError> {
        if self.fail_start {
            return Err(WorkerError::Session(format!(
                "could not publish agent audio in '{}'",
                self.name
            )));
        }
        self.sessions.lock().unwrap().push(session);
        let mut disconnected = self.disconnected.clone();
        Ok(RunningSession::spawn(self.name.clone(), async move {
            while !*disconnected.borrow() {
                if disconnected.changed().await.is_err() {
                    break;
                }
            }
            Ok(())
        }))
    }
}

pub struct MockConnector {
    failing: Mutex<HashSet<String>>,
    failing_start: Mutex<HashSet<String>>,
    connects: Mutex<Vec<String>>,
    disconnect_tx: watch::Sender<bool>,
    pub sessions: Arc<Mutex<Vec<Arc<LiveSession>>>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        let (disconnect_tx, _) = watch::channel(false);
        Self {
            failing: Mutex::new(HashSet::new()),
            failing_start: Mutex::new(HashSet::new()),
            connects: Mutex::new(Vec::new()),
            disconnect_tx,
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConnector {
    pub fn fail_room(&self, room: &str) {
        self.failing.lock().unwrap().insert(room.to_string());
    }

    /// Lets `room` connect but fail to start its session.
    pub fn fail_start(&self, room: &str) {
        self.failing_start.lock().unwrap().insert(room.to_string());
    }

    pub fn heal_room(&self, room: &str) {
        self.failing.lock().unwrap().remove(room);
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    /// Ends every running session.
    pub fn disconnect(&self) {
        self.disconnect_tx.send_replace(true);
    }

    /// Lets sessions started from now on run again.
    pub fn reconnect(&self) {
        self.disconnect_tx.send_replace(false);
    }
}

#[async_trait]
impl RoomConnector for MockConnector {
    async fn connect(&self, room_name: &str) -> Result<Arc<dyn Room>, WorkerError> {
        self.connects.lock().unwrap().push(room_name.to_string());
        if self.failing.lock().unwrap().contains(room_name) {
            return Err(WorkerError::Connect {
                room: room_name.to_string(),
                reason: "signal connection refused".into(),
            });
        }
        Ok(Arc::new(MockRoom {
            name: room_name.to_string(),
            fail_start: self.failing_start.lock().unwrap().contains(room_name),
            disconnected: self.disconnect_tx.subscribe(),
            sessions: self.sessions.clone(),
        }))
    }
}

/// Polls `cond` until it holds or a second has passed.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    cond()
}
