//! The worker loop that drives the three job hooks.

use crate::error::WorkerError;
use crate::job::{JobContext, JobDecision, JobRequest, RoomConnector};
use crate::process::JobProcess;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default depth of the job assignment queue.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The hooks a worker invokes.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// One-time process initialization, run before any job is offered.
    /// An error aborts worker startup.
    fn prewarm(&self, _proc: &JobProcess) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Decides whether to take a job. Must call `accept` or `reject` before
    /// returning; an undecided request is treated as rejected.
    async fn on_request(&self, request: JobRequest) {
        request.accept();
    }

    /// Runs an accepted job to completion.
    async fn entrypoint(&self, ctx: JobContext) -> Result<(), WorkerError>;
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Name stamped on every job request.
    pub agent_name: String,
    /// Capacity of the assignment queue between handles and the loop.
    pub queue_capacity: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            agent_name: "roomvox-agent".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct JobAssignment {
    job_id: String,
    room_name: String,
    reply: oneshot::Sender<JobDecision>,
}

/// Result of dispatching a job to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub job_id: String,
    pub decision: JobDecision,
}

/// Submits jobs to a running [`Worker`]. The worker stops once every handle
/// is dropped.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<JobAssignment>,
}

impl WorkerHandle {
    /// Offers a job for `room_name` and waits for the request filter's
    /// decision (not for the job itself).
    pub async fn dispatch(&self, room_name: &str) -> Result<Dispatch, WorkerError> {
        let job_id = Uuid::new_v4().to_string();
        let (reply, decision) = oneshot::channel();
        self.tx
            .send(JobAssignment {
                job_id: job_id.clone(),
                room_name: room_name.to_string(),
                reply,
            })
            .await
            .map_err(|_| WorkerError::WorkerStopped)?;
        let decision = decision.await.map_err(|_| WorkerError::WorkerStopped)?;
        Ok(Dispatch { job_id, decision })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type JobOutcome = (String, String, Result<(), WorkerError>);

pub struct Worker<H: JobHandler> {
    options: WorkerOptions,
    handler: Arc<H>,
    connector: Arc<dyn RoomConnector>,
    proc: Arc<JobProcess>,
    rx: mpsc::Receiver<JobAssignment>,
}

impl<H: JobHandler> Worker<H> {
    pub fn new(
        options: WorkerOptions,
        handler: Arc<H>,
        connector: Arc<dyn RoomConnector>,
    ) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let worker = Self {
            options,
            handler,
            connector,
            proc: Arc::new(JobProcess::new()),
            rx,
        };
        (worker, WorkerHandle { tx })
    }

    /// The process context shared by prewarm and all entrypoints.
    pub fn process(&self) -> Arc<JobProcess> {
        self.proc.clone()
    }

    /// Prewarms, then serves assignments until every handle is dropped and
    /// all running jobs have finished.
    ///
    /// # Errors
    ///
    /// Only a prewarm failure is returned; job failures are logged.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        info!(
            agent = %self.options.agent_name,
            process = self.proc.id(),
            "prewarming worker process"
        );
        self.handler.prewarm(&self.proc)?;
        info!(agent = %self.options.agent_name, "worker ready for jobs");

        let mut jobs: JoinSet<JobOutcome> = JoinSet::new();
        loop {
            tokio::select! {
                assignment = self.rx.recv() => match assignment {
                    Some(assignment) => self.assign(assignment, &mut jobs).await,
                    None => break,
                },
                Some(done) = jobs.join_next(), if !jobs.is_empty() => log_outcome(done),
            }
        }

        if !jobs.is_empty() {
            info!(running = jobs.len(), "worker draining running jobs");
        }
        while let Some(done) = jobs.join_next().await {
            log_outcome(done);
        }
        info!(agent = %self.options.agent_name, "worker stopped");
        Ok(())
    }

    async fn assign(&self, assignment: JobAssignment, jobs: &mut JoinSet<JobOutcome>) {
        let JobAssignment {
            job_id,
            room_name,
            reply,
        } = assignment;

        let (request, mut decision_rx) =
            JobRequest::new(&job_id, &room_name, &self.options.agent_name);
        self.handler.on_request(request).await;

        let decision = match decision_rx.try_recv() {
            Ok(decision) => decision,
            Err(oneshot::error::TryRecvError::Empty) => {
                warn!(job_id = %job_id, room = %room_name, "request filter returned without a decision");
                JobDecision::Rejected
            }
            Err(oneshot::error::TryRecvError::Closed) => JobDecision::Rejected,
        };

        if decision == JobDecision::Accepted {
            let ctx = JobContext::new(
                job_id.clone(),
                room_name.clone(),
                self.proc.clone(),
                self.connector.clone(),
            );
            let handler = self.handler.clone();
            let (id, room) = (job_id.clone(), room_name.clone());
            jobs.spawn(async move {
                let result = handler.entrypoint(ctx).await;
                (id, room, result)
            });
        }

        if reply.send(decision).is_err() {
            warn!(job_id = %job_id, room = %room_name, "dispatcher went away before the decision");
        }
    }
}

fn log_outcome(done: Result<JobOutcome, tokio::task::JoinError>) {
    match done {
        Ok((job_id, room, Ok(()))) => {
            info!(job_id = %job_id, room = %room, "job finished");
        }
        Ok((job_id, room, Err(e))) => {
            error!(job_id = %job_id, room = %room, "job failed: {}", e);
        }
        Err(e) => {
            error!("job entrypoint panicked: {}", e);
        }
    }
}
