use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const URL_ENV: &str = "LIVEKIT_URL";
pub const API_KEY_ENV: &str = "LIVEKIT_API_KEY";
pub const API_SECRET_ENV: &str = "LIVEKIT_API_SECRET";

fn default_token_ttl_seconds() -> u64 {
    3600
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// Signalling URL, usually `ws://` or `wss://`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }

    /// Overrides fields from `LIVEKIT_URL`, `LIVEKIT_API_KEY` and
    /// `LIVEKIT_API_SECRET` as returned by `env`.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env(URL_ENV) {
            self.url = url;
        }
        if let Some(key) = env(API_KEY_ENV) {
            self.api_key = key;
        }
        if let Some(secret) = env(API_SECRET_ENV) {
            self.api_secret = secret;
        }
    }

    /// Fails if credentials needed to mint tokens are missing.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.url.trim().is_empty() {
            return Err(VoiceError::Config("livekit url is empty".into()));
        }
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(VoiceError::Config(
                "livekit api_key and api_secret must be set".into(),
            ));
        }
        if self.token_ttl_seconds == 0 {
            return Err(VoiceError::Config(
                "livekit token_ttl_seconds must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP(S) form of a LiveKit signalling URL, used for server API calls.
///
/// `ws://` becomes `http://` and `wss://` becomes `https://`; anything else
/// is returned unchanged.
pub fn http_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}
