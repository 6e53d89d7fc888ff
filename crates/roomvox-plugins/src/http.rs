//! Shared HTTP plumbing for the engine adapters.

use roomvox_worker::EngineError;
use std::time::Duration;

/// Longest error body kept in an `EngineError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn client(engine: &'static str, timeout: Duration) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Config(format!("failed to build {} HTTP client: {}", engine, e)))
}

pub(crate) fn api_key_from_env(var: &str) -> Result<String, EngineError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(EngineError::Config(format!("{} is not set", var))),
    }
}

pub(crate) fn request_error(engine: &'static str, timeout: Duration, e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout {
            engine,
            seconds: timeout.as_secs(),
        }
    } else {
        EngineError::Request {
            engine,
            reason: e.to_string(),
        }
    }
}

/// Turns a non-2xx response into `EngineError::Status`.
pub(crate) async fn ensure_success(
    engine: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EngineError::Status {
        engine,
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    engine: &'static str,
    response: reqwest::Response,
) -> Result<T, EngineError> {
    response.json::<T>().await.map_err(|e| EngineError::Decode {
        engine,
        reason: e.to_string(),
    })
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
