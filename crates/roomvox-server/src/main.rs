//! roomvox server binary: runs the voice agent worker and the token API.
//!
//! Starts the worker (prewarm first), then an axum HTTP server with
//! structured logging and graceful shutdown on SIGTERM/SIGINT.

use roomvox_plugins::PluginEngines;
use roomvox_server::config::{self, Config};
use roomvox_server::dispatch::{self, DispatchRegistry};
use roomvox_server::{app, AppState, VoiceAgent};
use roomvox_voice::{LiveKitConnector, VoiceService, MEDIA_ENABLED};
use roomvox_worker::{RoomAdmission, Worker, WorkerOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// How long running sessions get to finish after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ROOMVOX_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();

    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration: the server cannot start without valid config");

    init_tracing(&config);

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => tracing::debug!("no .env file found"),
        Err(e) => tracing::warn!("failed to load .env file: {}", e),
    }
    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let voice = Arc::new(VoiceService::new(config.livekit.clone()));
    if let Err(e) = config.livekit.validate() {
        tracing::warn!("livekit is not fully configured, tokens and rooms will fail: {}", e);
    }
    if !MEDIA_ENABLED {
        tracing::warn!(
            "built without the `rtc` feature, dispatched agents cannot join rooms; \
             rebuild with `--features rtc` to enable voice sessions"
        );
    }

    let admission = RoomAdmission::new();
    let engines = Arc::new(PluginEngines::new(config.plugins.clone()));
    let agent = Arc::new(
        VoiceAgent::new(admission.clone(), engines)
            .with_llm_model(&config.agent.llm_model)
            .with_instructions(&config.agent.instructions),
    );
    let connector = Arc::new(LiveKitConnector::new(voice.clone(), &config.agent.name));
    let (worker, handle) = Worker::new(
        WorkerOptions {
            agent_name: config.agent.name.clone(),
            queue_capacity: config.worker.queue_capacity,
        },
        agent,
        connector,
    );
    let mut worker_task = tokio::spawn(worker.run());

    let dispatches = Arc::new(DispatchRegistry::new(Duration::from_secs(
        config.dispatch.ttl_seconds,
    )));
    let pruning = tokio::spawn(dispatch::start_pruning_task(dispatches.clone()));

    let state = AppState {
        voice,
        worker: handle,
        dispatches,
        admission,
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, agent = %config.agent.name, "starting roomvox server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address: is another process using this port?");

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
                std::process::exit(1);
            }
        }
        joined = &mut worker_task => {
            match joined {
                Ok(Err(e)) => tracing::error!("worker failed to start: {}", e),
                Ok(Ok(())) => tracing::error!("worker stopped unexpectedly"),
                Err(e) => tracing::error!("worker task panicked: {}", e),
            }
            std::process::exit(1);
        }
    }

    pruning.abort();

    // The router (and with it the last worker handle) is gone; the worker
    // drains its running jobs.
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut worker_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!("worker error: {}", e),
        Ok(Err(e)) => tracing::error!("worker task panicked: {}", e),
        Err(_) => {
            tracing::warn!(
                grace_seconds = SHUTDOWN_GRACE.as_secs(),
                "sessions still running after grace period, aborting"
            );
            worker_task.abort();
        }
    }

    tracing::info!("roomvox server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
