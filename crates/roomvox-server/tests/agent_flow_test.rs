mod common;

use common::{eventually, MockConnector, MockEngines};
use roomvox_server::agent::VAD_KEY;
use roomvox_server::VoiceAgent;
use roomvox_worker::{
    AudioBuffer, ChatRole, JobContext, JobDecision, JobHandler, JobProcess, JobRequest,
    RoomAdmission, VoiceActivityDetector, Worker, WorkerError, WorkerOptions,
    DEFAULT_INSTRUCTIONS,
};
use std::sync::Arc;

fn agent_with(engines: Arc<MockEngines>) -> VoiceAgent {
    VoiceAgent::new(RoomAdmission::new(), engines)
}

async fn request(agent: &VoiceAgent, job_id: &str, room: &str) -> JobDecision {
    let (request, decision) = JobRequest::new(job_id, room, "roomvox-agent");
    agent.on_request(request).await;
    decision.await.expect("request filter must decide")
}

fn prewarmed(agent: &VoiceAgent) -> Arc<JobProcess> {
    let proc = Arc::new(JobProcess::new());
    agent.prewarm(&proc).expect("prewarm");
    proc
}

#[tokio::test]
async fn absent_room_is_accepted_and_recorded() {
    let agent = agent_with(Arc::new(MockEngines::default()));

    assert_eq!(request(&agent, "job-1", "studio-1").await, JobDecision::Accepted);
    assert!(agent.admission().contains("studio-1"));
}

#[tokio::test]
async fn present_room_is_rejected_and_set_unchanged() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    request(&agent, "job-1", "studio-1").await;

    assert_eq!(request(&agent, "job-2", "studio-1").await, JobDecision::Rejected);
    assert_eq!(agent.admission().rooms(), vec!["studio-1".to_string()]);
}

#[tokio::test]
async fn distinct_rooms_are_both_accepted() {
    let agent = agent_with(Arc::new(MockEngines::default()));

    assert_eq!(request(&agent, "job-a", "a").await, JobDecision::Accepted);
    assert_eq!(request(&agent, "job-b", "b").await, JobDecision::Accepted);
    assert_eq!(agent.admission().rooms(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn prewarm_stores_detector_in_userdata() {
    let engines = Arc::new(MockEngines::default());
    let agent = agent_with(engines.clone());
    let proc = prewarmed(&agent);

    let vad: Arc<dyn VoiceActivityDetector> = proc.userdata().get(VAD_KEY).unwrap();
    assert!(vad.is_speech(&[100; 160]));
    assert_eq!(*engines.vad_loads.lock().unwrap(), 1);
}

#[tokio::test]
async fn prewarm_failure_is_reported() {
    let agent = agent_with(Arc::new(MockEngines::failing_vad()));
    let proc = JobProcess::new();

    let err = agent.prewarm(&proc).unwrap_err();
    assert!(matches!(err, WorkerError::Prewarm(_)));
    assert!(!proc.userdata().contains(VAD_KEY));
}

#[tokio::test]
async fn studio_scenario_connect_failure_releases_room() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    let proc = prewarmed(&agent);
    let connector = Arc::new(MockConnector::default());
    connector.fail_room("studio-1");

    assert_eq!(request(&agent, "job-1", "studio-1").await, JobDecision::Accepted);
    assert_eq!(request(&agent, "job-2", "studio-1").await, JobDecision::Rejected);

    let ctx = JobContext::new("job-1", "studio-1", proc.clone(), connector.clone());
    let err = agent.entrypoint(ctx).await.unwrap_err();
    assert!(matches!(err, WorkerError::Connect { .. }));
    assert!(agent.admission().is_empty());

    assert_eq!(request(&agent, "job-3", "studio-1").await, JobDecision::Accepted);
}

#[tokio::test]
async fn entrypoint_without_prewarm_fails_and_releases() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    let connector = Arc::new(MockConnector::default());
    request(&agent, "job-1", "studio-1").await;

    let ctx = JobContext::new("job-1", "studio-1", Arc::new(JobProcess::new()), connector);
    let err = agent.entrypoint(ctx).await.unwrap_err();
    match err {
        WorkerError::MissingUserdata(key) => assert_eq!(key, "vad"),
        other => panic!("expected MissingUserdata, got {:?}", other),
    }
    assert!(!agent.admission().contains("studio-1"));
}

#[tokio::test]
async fn session_start_failure_releases_room() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    let proc = prewarmed(&agent);
    let connector = Arc::new(MockConnector::default());
    connector.fail_start("studio-1");
    request(&agent, "job-1", "studio-1").await;

    let ctx = JobContext::new("job-1", "studio-1", proc, connector.clone());
    let err = agent.entrypoint(ctx).await.unwrap_err();
    assert!(matches!(err, WorkerError::Session(_)));
    assert_eq!(connector.connects(), vec!["studio-1".to_string()]);
    assert!(agent.admission().is_empty());
    assert_eq!(request(&agent, "job-2", "studio-1").await, JobDecision::Accepted);
}

#[tokio::test]
async fn cancelled_entrypoint_releases_room() {
    let agent = Arc::new(agent_with(Arc::new(MockEngines::default())));
    let proc = prewarmed(&agent);
    let connector = Arc::new(MockConnector::default());
    request(&agent, "job-1", "studio-1").await;

    let ctx = JobContext::new("job-1", "studio-1", proc, connector.clone());
    let sessions = connector.sessions.clone();
    let running = agent.clone();
    let job = tokio::spawn(async move { running.entrypoint(ctx).await });

    assert!(eventually(|| !sessions.lock().unwrap().is_empty()).await);
    assert!(agent.admission().contains("studio-1"));

    job.abort();
    assert!(job.await.unwrap_err().is_cancelled());
    assert!(agent.admission().is_empty());
}

#[tokio::test]
async fn default_agent_uses_groq_default_model() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    assert_eq!(agent.llm_model(), roomvox_plugins::groq::DEFAULT_MODEL);
}

#[tokio::test]
async fn session_uses_configured_model_and_instructions() {
    let engines = Arc::new(MockEngines::default());
    let agent = agent_with(engines.clone()).with_instructions("Answer in one word.");
    let proc = prewarmed(&agent);
    let connector = Arc::new(MockConnector::default());
    request(&agent, "job-1", "studio-1").await;

    let ctx = JobContext::new("job-1", "studio-1", proc, connector.clone());
    let sessions = connector.sessions.clone();
    let job = tokio::spawn(async move { agent.entrypoint(ctx).await });

    assert!(eventually(|| !sessions.lock().unwrap().is_empty()).await);
    assert_eq!(
        *engines.llm_models.lock().unwrap(),
        vec!["llama-3.1-8b-instant".to_string()]
    );

    let session = sessions.lock().unwrap()[0].clone();
    assert_eq!(session.agent().instructions(), "Answer in one word.");
    let reply = session
        .respond(&AudioBuffer::mono(vec![7; 480], 16_000))
        .await
        .unwrap()
        .expect("non-empty transcript yields a reply");
    assert_eq!(reply.samples.len(), "sure thing".len());

    let llm = engines.last_llm.lock().unwrap().clone().unwrap();
    let calls = llm.calls.lock().unwrap();
    assert_eq!(calls[0][0].role, ChatRole::System);
    assert_eq!(calls[0][0].content, "Answer in one word.");
    assert_eq!(calls[0][1].content, "480 samples");
    drop(calls);

    connector.disconnect();
    job.await.unwrap().unwrap();
}

#[tokio::test]
async fn default_instructions_are_used() {
    let agent = agent_with(Arc::new(MockEngines::default()));
    let proc = prewarmed(&agent);
    let connector = Arc::new(MockConnector::default());
    connector.disconnect();
    request(&agent, "job-1", "studio-1").await;

    let ctx = JobContext::new("job-1", "studio-1", proc, connector.clone());
    agent.entrypoint(ctx).await.unwrap();

    let sessions = connector.sessions.lock().unwrap();
    assert_eq!(sessions[0].agent().instructions(), DEFAULT_INSTRUCTIONS);
    assert!(agent.admission().is_empty());
}

#[tokio::test]
async fn worker_runs_one_agent_per_room_until_disconnect() {
    let engines = Arc::new(MockEngines::default());
    let admission = RoomAdmission::new();
    let agent = Arc::new(VoiceAgent::new(admission.clone(), engines.clone()));
    let connector = Arc::new(MockConnector::default());
    let (worker, handle) = Worker::new(WorkerOptions::default(), agent, connector.clone());
    let worker_task = tokio::spawn(worker.run());

    let first = handle.dispatch("studio-1").await.unwrap();
    assert_eq!(first.decision, JobDecision::Accepted);
    let second = handle.dispatch("studio-1").await.unwrap();
    assert_eq!(second.decision, JobDecision::Rejected);
    let other = handle.dispatch("lobby").await.unwrap();
    assert_eq!(other.decision, JobDecision::Accepted);
    assert_eq!(admission.rooms(), vec!["lobby".to_string(), "studio-1".to_string()]);

    connector.disconnect();
    assert!(eventually(|| admission.is_empty()).await);

    connector.reconnect();
    let again = handle.dispatch("studio-1").await.unwrap();
    assert_eq!(again.decision, JobDecision::Accepted);
    assert_ne!(again.job_id, first.job_id);

    connector.disconnect();
    drop(handle);
    worker_task.await.unwrap().unwrap();
    assert!(admission.is_empty());
    assert_eq!(*engines.vad_loads.lock().unwrap(), 1);
}

#[tokio::test]
async fn worker_aborts_when_prewarm_fails() {
    let agent = Arc::new(VoiceAgent::new(
        RoomAdmission::new(),
        Arc::new(MockEngines::failing_vad()),
    ));
    let (worker, handle) = Worker::new(
        WorkerOptions::default(),
        agent,
        Arc::new(MockConnector::default()),
    );

    let err = worker.run().await.unwrap_err();
    assert!(matches!(err, WorkerError::Prewarm(_)));
    assert!(matches!(
        handle.dispatch("studio-1").await,
        Err(WorkerError::WorkerStopped)
    ));
}
