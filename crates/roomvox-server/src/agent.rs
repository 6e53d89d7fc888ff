//! The voice agent: prewarm, request filter and entrypoint.

use async_trait::async_trait;
use roomvox_worker::{
    Admission, AdmissionGuard, AgentSession, Assistant, EngineProvider, JobContext, JobHandler,
    JobProcess, JobRequest, RoomAdmission, VoiceActivityDetector, WorkerError,
    DEFAULT_INSTRUCTIONS,
};
use roomvox_plugins::groq;
use std::sync::Arc;
use tracing::info;

/// Process userdata key of the prewarmed voice-activity detector.
pub const VAD_KEY: &str = "vad";

/// Runs at most one assistant session per room in this process.
pub struct VoiceAgent {
    admission: RoomAdmission,
    engines: Arc<dyn EngineProvider>,
    llm_model: String,
    instructions: String,
}

impl VoiceAgent {
    pub fn new(admission: RoomAdmission, engines: Arc<dyn EngineProvider>) -> Self {
        Self {
            admission,
            engines,
            llm_model: groq::DEFAULT_MODEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Rooms that currently have an agent in this process.
    pub fn admission(&self) -> &RoomAdmission {
        &self.admission
    }

    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }
}

impl std::fmt::Debug for VoiceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAgent")
            .field("rooms", &self.admission.rooms())
            .field("llm_model", &self.llm_model)
            .finish()
    }
}

/// Releases the room and logs the departure, in that order.
struct Departure {
    job_id: String,
    guard: Option<AdmissionGuard>,
}

impl Drop for Departure {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let room = guard.room().to_string();
        drop(guard);
        info!(room = %room, job_id = %self.job_id, "agent left room");
    }
}

#[async_trait]
impl JobHandler for VoiceAgent {
    fn prewarm(&self, proc: &JobProcess) -> Result<(), WorkerError> {
        let vad = self
            .engines
            .load_vad()
            .map_err(|e| WorkerError::Prewarm(format!("failed to load voice activity detector: {}", e)))?;
        proc.userdata().insert::<Arc<dyn VoiceActivityDetector>>(VAD_KEY, vad);
        info!(process = proc.id(), "voice activity detector loaded");
        Ok(())
    }

    async fn on_request(&self, request: JobRequest) {
        match self.admission.try_admit(request.room_name()) {
            Admission::Accepted => {
                info!(
                    room = %request.room_name(),
                    job_id = %request.job_id(),
                    agent = %request.agent_name(),
                    "accepting job"
                );
                request.accept();
            }
            Admission::Rejected => {
                info!(
                    room = %request.room_name(),
                    job_id = %request.job_id(),
                    agent = %request.agent_name(),
                    "agent already active in room, rejecting job"
                );
                request.reject();
            }
        }
    }

    async fn entrypoint(&self, ctx: JobContext) -> Result<(), WorkerError> {
        info!(room = %ctx.room_name(), job_id = %ctx.job_id(), "agent starting");
        let _departure = Departure {
            job_id: ctx.job_id().to_string(),
            guard: Some(self.admission.release_on_drop(ctx.room_name())),
        };

        let room = ctx.connect().await?;
        let vad: Arc<dyn VoiceActivityDetector> = ctx.proc().userdata().get(VAD_KEY)?;

        let session = AgentSession::builder()
            .stt(self.engines.stt()?)
            .llm(self.engines.llm(&self.llm_model)?)
            .tts(self.engines.tts()?)
            .vad(vad)
            .build()?;
        let running = session
            .start(Assistant::new(self.instructions.clone()), room.as_ref())
            .await?;
        info!(room = %ctx.room_name(), job_id = %ctx.job_id(), "session started");

        running.wait().await
    }
}
