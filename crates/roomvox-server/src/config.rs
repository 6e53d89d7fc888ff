//! Server configuration loading from file and environment variables.

use roomvox_plugins::PluginConfig;
use roomvox_voice::LiveKitConfig;
use roomvox_worker::DEFAULT_INSTRUCTIONS;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// LiveKit server and credentials.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Speech, language-model and voice-activity engine options.
    #[serde(default)]
    pub plugins: PluginConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "roomvox_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// The voice agent's identity and behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Agent name used for dispatch and as the participant name.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Model id sent to the language model.
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// System instructions for the assistant.
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Job assignments buffered ahead of the request filter.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// How long a room's dispatch record is kept.
    #[serde(default = "default_dispatch_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_agent_name() -> String {
    "roomvox-agent".to_string()
}

fn default_llm_model() -> String {
    roomvox_plugins::groq::DEFAULT_MODEL.to_string()
}

fn default_instructions() -> String {
    DEFAULT_INSTRUCTIONS.to_string()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_dispatch_ttl_seconds() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            llm_model: default_llm_model(),
            instructions: default_instructions(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_dispatch_ttl_seconds(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ROOMVOX_HOST` overrides `server.host`
/// - `ROOMVOX_PORT` (or `PORT`) overrides `server.port`
/// - `ROOMVOX_LOG_LEVEL` overrides `logging.level`
/// - `ROOMVOX_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ROOMVOX_AGENT_NAME` overrides `agent.name`
/// - `ROOMVOX_LLM_MODEL` overrides `agent.llm_model`
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` override `livekit.*`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env);
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env("ROOMVOX_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("ROOMVOX_PORT").or_else(|| env("PORT")) {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = env("ROOMVOX_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("ROOMVOX_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(name) = env("ROOMVOX_AGENT_NAME").filter(|v| !v.trim().is_empty()) {
        config.agent.name = name;
    }
    if let Some(model) = env("ROOMVOX_LLM_MODEL").filter(|v| !v.trim().is_empty()) {
        config.agent.llm_model = model;
    }
    config.livekit.apply_env(&env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = load_config_with_env(None, env_of(&[])).unwrap();
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.agent.llm_model, "llama-3.1-8b-instant");
        assert_eq!(config.agent.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(config.dispatch.ttl_seconds, 3600);
        assert_eq!(config.livekit.token_ttl_seconds, 3600);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_with_env(path.to_str(), env_of(&[])).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [agent]
            llm_model = "llama-3.3-70b-versatile"

            [livekit]
            url = "wss://demo.livekit.cloud"
            api_key = "key"
            api_secret = "secret"

            [plugins.vad]
            min_silence_ms = 400
            "#
        )
        .unwrap();

        let config = load_config_with_env(file.path().to_str(), env_of(&[])).unwrap();
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.agent.llm_model, "llama-3.3-70b-versatile");
        assert_eq!(config.agent.name, "roomvox-agent");
        assert_eq!(config.livekit.url, "wss://demo.livekit.cloud");
        assert_eq!(config.plugins.vad.min_silence_ms, 400);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let err = load_config_with_env(file.path().to_str(), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file() {
        let env = env_of(&[
            ("ROOMVOX_PORT", "4000"),
            ("PORT", "5000"),
            ("ROOMVOX_LOG_JSON", "1"),
            ("ROOMVOX_LLM_MODEL", "llama-3.1-70b"),
            ("LIVEKIT_URL", "ws://localhost:7880"),
            ("LIVEKIT_API_KEY", "devkey"),
            ("LIVEKIT_API_SECRET", "secret"),
        ]);
        let config = load_config_with_env(None, env).unwrap();
        assert_eq!(config.server.port, 4000);
        assert!(config.logging.json);
        assert_eq!(config.agent.llm_model, "llama-3.1-70b");
        assert_eq!(config.livekit.url, "ws://localhost:7880");
        assert_eq!(config.livekit.api_key, "devkey");
        assert_eq!(config.livekit.api_secret, "secret");
    }

    #[test]
    fn plain_port_is_honored() {
        let config = load_config_with_env(None, env_of(&[("PORT", "5000")])).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn invalid_port_is_ignored() {
        let config = load_config_with_env(None, env_of(&[("ROOMVOX_PORT", "nope")])).unwrap();
        assert_eq!(config.server.port, 3001);
    }
}
