//! Job request, job context and the room-connection seam.

use crate::error::WorkerError;
use crate::process::JobProcess;
use crate::session::LiveSession;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Decision taken by the request filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDecision {
    Accepted,
    Rejected,
}

/// An offer to run an agent in a room.
///
/// Exactly one of [`accept`](Self::accept) or [`reject`](Self::reject) can be
/// called since both consume the request. Dropping it undecided counts as a
/// rejection.
#[derive(Debug)]
pub struct JobRequest {
    job_id: String,
    room_name: String,
    agent_name: String,
    decision: Option<oneshot::Sender<JobDecision>>,
}

impl JobRequest {
    /// Creates a request and the receiver its decision is delivered to.
    pub fn new(
        job_id: impl Into<String>,
        room_name: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> (Self, oneshot::Receiver<JobDecision>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            job_id: job_id.into(),
            room_name: room_name.into(),
            agent_name: agent_name.into(),
            decision: Some(tx),
        };
        (request, rx)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn accept(mut self) {
        self.decide(JobDecision::Accepted);
    }

    pub fn reject(mut self) {
        self.decide(JobDecision::Rejected);
    }

    fn decide(&mut self, decision: JobDecision) {
        if let Some(tx) = self.decision.take() {
            // The receiver is gone only if the worker loop itself stopped.
            let _ = tx.send(decision);
        }
    }
}

/// Establishes the transport connection for a room.
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(&self, room_name: &str) -> Result<Arc<dyn Room>, WorkerError>;
}

/// A connected room able to host an agent session.
#[async_trait]
pub trait Room: Send + Sync {
    fn name(&self) -> &str;

    /// Binds `session` to the room's media and returns once it is live.
    /// The returned handle completes when the room disconnects.
    async fn start_session(&self, session: Arc<LiveSession>)
        -> Result<RunningSession, WorkerError>;
}

/// A session that is live in a room.
///
/// Dropping the handle stops the session.
#[derive(Debug)]
pub struct RunningSession {
    room: String,
    task: Option<JoinHandle<Result<(), WorkerError>>>,
}

impl RunningSession {
    /// Runs `fut` as the session's lifetime on the current runtime.
    pub fn spawn<F>(room: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        Self {
            room: room.into(),
            task: Some(tokio::spawn(fut)),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Waits until the session ends.
    pub async fn wait(mut self) -> Result<(), WorkerError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WorkerError::Session(format!(
                "session in room '{}' was cancelled",
                self.room
            ))),
            Err(e) => Err(WorkerError::Session(format!(
                "session task in room '{}' panicked: {}",
                self.room, e
            ))),
        }
    }
}

impl Drop for RunningSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Everything an entrypoint needs for one accepted job.
#[derive(Clone)]
pub struct JobContext {
    job_id: String,
    room_name: String,
    proc: Arc<JobProcess>,
    connector: Arc<dyn RoomConnector>,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<String>,
        room_name: impl Into<String>,
        proc: Arc<JobProcess>,
        connector: Arc<dyn RoomConnector>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            room_name: room_name.into(),
            proc,
            connector,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn proc(&self) -> &JobProcess {
        &self.proc
    }

    /// Connects to the job's room.
    pub async fn connect(&self) -> Result<Arc<dyn Room>, WorkerError> {
        self.connector.connect(&self.room_name).await
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("room_name", &self.room_name)
            .field("proc", &self.proc.id())
            .finish()
    }
}
