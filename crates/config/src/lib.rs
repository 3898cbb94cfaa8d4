//! Configuration loading, validation, and management for IronQuill.
//!
//! Loads configuration from `~/.ironquill/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The heartbeat interval band the stream layer accepts, in seconds.
pub const HEARTBEAT_MIN_SECS: u64 = 10;
pub const HEARTBEAT_MAX_SECS: u64 = 30;

/// The root configuration structure.
///
/// Maps directly to `~/.ironquill/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway (HTTP server) configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Long-term memory service configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Streaming session configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Per-turn defaults applied when the request omits a field
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Telemetry and cost tracking configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("gateway", &self.gateway)
            .field("provider", &self.provider)
            .field("memory", &self.memory)
            .field("stream", &self.stream)
            .field("defaults", &self.defaults)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: "openai" (any OpenAI-compatible endpoint) or
    /// "scripted" (deterministic playback, for development)
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// API key (`IRONQUILL_API_KEY` / `OPENAI_API_KEY` override this)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the chat completions API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used when the request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Whole-request timeout for upstream calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether memory retrieval is available at all. Individual turns still
    /// opt in with `useMemory`.
    #[serde(default)]
    pub enabled: bool,

    /// Backend: "http" | "in_memory" | "noop"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Base URL of the memory service (http backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bearer token for the memory service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum fragments per retrieval
    #[serde(default = "default_memory_limit")]
    pub limit: usize,
}

fn default_memory_backend() -> String {
    "noop".into()
}
fn default_memory_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_memory_backend(),
            base_url: None,
            api_key: None,
            limit: default_memory_limit(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("enabled", &self.enabled)
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("limit", &self.limit)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Heartbeat comment interval, clamped to 10–30s at use
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Outbound frame channel capacity per turn
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Retry policy for stream establishment
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_heartbeat_secs() -> u64 {
    15
}
fn default_channel_capacity() -> usize {
    128
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            channel_capacity: default_channel_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

impl StreamConfig {
    /// The effective heartbeat interval, clamped to the accepted band.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.clamp(HEARTBEAT_MIN_SECS, HEARTBEAT_MAX_SECS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts at stream establishment (1 = no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base; attempt n sleeps base × 2^(n-1)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts(), base_delay_ms: default_base_delay_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// System prompt applied when the request does not carry one
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Telemetry and cost tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// How many recent turn records to retain in memory
    #[serde(default = "default_retain_turns")]
    pub retain_turns: usize,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_retain_turns() -> usize {
    256
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            retain_turns: default_retain_turns(),
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ironquill/config.toml).
    ///
    /// Environment overrides, highest priority first:
    /// - `IRONQUILL_API_KEY`, then `OPENAI_API_KEY`, for the provider key
    /// - `IRONQUILL_MODEL` for the default model
    /// - `IRONQUILL_MEMORY_API_KEY` for the memory service token
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = std::env::var("IRONQUILL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("IRONQUILL_MODEL") {
            self.provider.default_model = model;
        }

        if self.memory.api_key.is_none() {
            self.memory.api_key = std::env::var("IRONQUILL_MEMORY_API_KEY").ok();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ironquill")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }

        if self.provider.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.default_model must not be empty".into(),
            ));
        }

        if self.defaults.temperature < 0.0 || self.defaults.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "defaults.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.stream.heartbeat_secs == 0 {
            return Err(ConfigError::ValidationError(
                "stream.heartbeat_secs must be non-zero".into(),
            ));
        }

        if self.stream.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "stream.channel_capacity must be non-zero".into(),
            ));
        }

        if self.stream.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "stream.retry.max_attempts must be at least 1".into(),
            ));
        }

        match self.memory.backend.as_str() {
            "http" => {
                if self.memory.enabled
                    && self.memory.base_url.as_deref().is_none_or(str::is_empty)
                {
                    return Err(ConfigError::ValidationError(
                        "memory.base_url is required for the http backend".into(),
                    ));
                }
            }
            "in_memory" | "noop" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown memory backend '{other}' (expected http, in_memory or noop)"
                )));
            }
        }

        Ok(())
    }

    /// Check if a provider API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            provider: ProviderConfig::default(),
            memory: MemoryConfig::default(),
            stream: StreamConfig::default(),
            defaults: DefaultsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.provider.default_model, "gpt-4o-mini");
        assert_eq!(config.memory.backend, "noop");
        assert!(!config.memory.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.provider.default_model, config.provider.default_model);
        assert_eq!(parsed.stream.heartbeat_secs, config.stream.heartbeat_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.defaults.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let mut config = AppConfig::default();
        config.stream.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_memory_requires_base_url() {
        let mut config = AppConfig::default();
        config.memory.enabled = true;
        config.memory.backend = "http".into();
        assert!(config.validate().is_err());

        config.memory.base_url = Some("http://localhost:9090".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_memory_backend_rejected() {
        let mut config = AppConfig::default();
        config.memory.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn heartbeat_interval_is_clamped() {
        let mut config = AppConfig::default();
        config.stream.heartbeat_secs = 3;
        assert_eq!(config.stream.heartbeat_interval(), Duration::from_secs(10));

        config.stream.heartbeat_secs = 300;
        assert_eq!(config.stream.heartbeat_interval(), Duration::from_secs(30));

        config.stream.heartbeat_secs = 20;
        assert_eq!(config.stream.heartbeat_interval(), Duration::from_secs(20));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().gateway.port, 8787);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[gateway]
port = 9000

[provider]
default_model = "gpt-4o"

[stream]
heartbeat_secs = 25

[telemetry.custom_pricing."local-llm"]
input_per_m = 0.0
output_per_m = 0.0
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.provider.default_model, "gpt-4o");
        assert_eq!(config.stream.heartbeat_secs, 25);
        assert!(config.telemetry.custom_pricing.contains_key("local-llm"));
        // Untouched sections keep their defaults.
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        config.memory.api_key = Some("mem-token".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("mem-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("8787"));
    }
}
