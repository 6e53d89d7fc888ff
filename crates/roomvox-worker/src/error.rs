use thiserror::Error;

/// Errors raised by the worker runtime and the job hooks it drives.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("process userdata has no entry for key '{0}'")]
    MissingUserdata(String),

    #[error("process userdata entry '{0}' has an unexpected type")]
    UserdataType(String),

    #[error("prewarm failed: {0}")]
    Prewarm(String),

    #[error("failed to connect to room '{room}': {reason}")]
    Connect { room: String, reason: String },

    #[error("session error: {0}")]
    Session(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker is no longer accepting jobs")]
    WorkerStopped,
}

/// Errors returned by speech, language-model and voice-activity engines.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("request to {engine} failed: {reason}")]
    Request { engine: &'static str, reason: String },

    #[error("{engine} returned HTTP {status}: {body}")]
    Status {
        engine: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {engine} response: {reason}")]
    Decode { engine: &'static str, reason: String },

    #[error("{engine} timed out after {seconds} seconds")]
    Timeout { engine: &'static str, seconds: u64 },

    #[error("{engine} failed: {reason}")]
    Failed { engine: &'static str, reason: String },
}
