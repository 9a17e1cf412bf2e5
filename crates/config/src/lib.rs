//! Configuration loading, validation, and management for Murasame.
//!
//! Loads configuration from `~/.murasame/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.murasame/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Inference pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Background screen observation
    #[serde(default)]
    pub observation: ObservationConfig,

    /// Speech synthesis assets and output
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Character art
    #[serde(default)]
    pub sprite: SpriteConfig,

    /// Persona override
    #[serde(default)]
    pub persona: PersonaConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Persona model endpoint (`{prompt, history, role}` protocol)
    #[serde(default = "default_chat_url")]
    pub chat_url: String,

    /// General assistant endpoint used for control prompts
    #[serde(default = "default_assistant_url")]
    pub assistant_url: String,

    /// Model id sent with chat requests
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// OpenAI-compatible base URL for the vision model
    #[serde(default = "default_vision_url")]
    pub vision_url: String,

    /// Vision model id
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// API key for the vision endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// SoVITS `/tts` endpoint
    #[serde(default = "default_speech_url")]
    pub speech_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chat_url() -> String {
    "http://127.0.0.1:28565/chat".into()
}
fn default_assistant_url() -> String {
    "http://127.0.0.1:28565/qwen3".into()
}
fn default_model_id() -> String {
    "murasame".into()
}
fn default_vision_url() -> String {
    "http://127.0.0.1:11434/v1".into()
}
fn default_vision_model() -> String {
    "qwen2.5vl:7b".into()
}
fn default_speech_url() -> String {
    "http://127.0.0.1:9880/tts".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            assistant_url: default_assistant_url(),
            model_id: default_model_id(),
            vision_url: default_vision_url(),
            vision_model: default_vision_model(),
            api_key: None,
            speech_url: default_speech_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for EndpointsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointsConfig")
            .field("chat_url", &self.chat_url)
            .field("assistant_url", &self.assistant_url)
            .field("model_id", &self.model_id)
            .field("vision_url", &self.vision_url)
            .field("vision_model", &self.vision_model)
            .field("api_key", &redact(&self.api_key))
            .field("speech_url", &self.speech_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Total generation attempts under the anti-repeat policy
    #[serde(default = "default_max_attempts")]
    pub max_generation_attempts: u32,

    /// Replies this short (in characters) are never treated as repeats
    #[serde(default = "default_repeat_exempt_len")]
    pub repeat_exempt_len: usize,

    /// Label used when the classifier answers outside the label set
    #[serde(default = "default_emotion")]
    pub default_emotion: String,

    /// Upper bound on waiting for synthesized speech
    #[serde(default = "default_artifact_timeout")]
    pub artifact_timeout_secs: u64,

    /// Poll interval while confirming the artifact landed in the store
    #[serde(default = "default_artifact_poll")]
    pub artifact_poll_ms: u64,

    /// Speech bubble wrap width in characters
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_repeat_exempt_len() -> usize {
    3
}
fn default_emotion() -> String {
    "平静".into()
}
fn default_artifact_timeout() -> u64 {
    60
}
fn default_artifact_poll() -> u64 {
    100
}
fn default_wrap_width() -> usize {
    12
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: default_max_attempts(),
            repeat_exempt_len: default_repeat_exempt_len(),
            default_emotion: default_emotion(),
            artifact_timeout_secs: default_artifact_timeout(),
            artifact_poll_ms: default_artifact_poll(),
            wrap_width: default_wrap_width(),
        }
    }
}

impl PipelineConfig {
    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_secs)
    }

    pub fn artifact_poll_interval(&self) -> Duration {
        Duration::from_millis(self.artifact_poll_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_observation_interval")]
    pub interval_secs: u64,

    /// Command printing a PNG screenshot to stdout
    #[serde(default = "default_capture_command")]
    pub capture_command: Vec<String>,
}

fn default_observation_interval() -> u64 {
    30
}
fn default_capture_command() -> Vec<String> {
    vec!["grim".into(), "-t".into(), "png".into(), "-".into()]
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_observation_interval(),
            capture_command: default_capture_command(),
        }
    }
}

impl ObservationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// One subdirectory per emotion label, each with samples and `asr.txt`
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,

    /// Where synthesized audio is stored, keyed by text hash
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from("models/Murasame_SoVITS/reference_voices")
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("voices")
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            reference_dir: default_reference_dir(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Directory holding `<variant>.txt` tables and `<variant>_<id>.png` layers
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,

    /// Art variant: "a" or "b"
    #[serde(default = "default_variant")]
    pub variant: String,

    /// Layers shown before the first reply
    #[serde(default = "default_initial_layers")]
    pub initial_layers: Vec<u32>,

    /// Where the foreground surface writes rendered frames
    #[serde(default = "default_frame_path")]
    pub frame_path: PathBuf,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("fgimages")
}
fn default_variant() -> String {
    "b".into()
}
fn default_initial_layers() -> Vec<u32> {
    vec![1717, 1475, 1261]
}
fn default_frame_path() -> PathBuf {
    PathBuf::from("frame.png")
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            variant: default_variant(),
            initial_layers: default_initial_layers(),
            frame_path: default_frame_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Replace the built-in persona prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.murasame/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `MURASAME_API_KEY`
    /// - `MURASAME_CHAT_URL`
    /// - `MURASAME_VISION_URL`
    /// - `MURASAME_SPEECH_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("MURASAME_API_KEY") {
            self.endpoints.api_key = Some(key);
        }
        if let Some(url) = lookup("MURASAME_CHAT_URL") {
            self.endpoints.chat_url = url;
        }
        if let Some(url) = lookup("MURASAME_VISION_URL") {
            self.endpoints.vision_url = url;
        }
        if let Some(url) = lookup("MURASAME_SPEECH_URL") {
            self.endpoints.speech_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".murasame")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_generation_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_generation_attempts must be at least 1".into(),
            ));
        }
        if self.pipeline.default_emotion.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.default_emotion must not be empty".into(),
            ));
        }
        if self.pipeline.artifact_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.artifact_poll_ms must be > 0".into(),
            ));
        }
        if self.observation.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "observation.interval_secs must be > 0".into(),
            ));
        }
        if self.observation.enabled && self.observation.capture_command.is_empty() {
            return Err(ConfigError::ValidationError(
                "observation.capture_command is required when observation is enabled".into(),
            ));
        }
        if !matches!(self.sprite.variant.as_str(), "a" | "b") {
            return Err(ConfigError::ValidationError(format!(
                "sprite.variant must be \"a\" or \"b\", got \"{}\"",
                self.sprite.variant
            )));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.max_generation_attempts, 4);
        assert_eq!(config.pipeline.default_emotion, "平静");
        assert_eq!(config.observation.interval_secs, 30);
        assert_eq!(config.sprite.initial_layers, vec![1717, 1475, 1261]);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.endpoints.chat_url, config.endpoints.chat_url);
        assert_eq!(parsed.sprite.variant, config.sprite.variant);
    }

    #[test]
    fn unknown_variant_rejected() {
        let mut config = AppConfig::default();
        config.sprite.variant = "c".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.max_generation_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.sprite.variant, "b");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[observation]
enabled = true
interval_secs = 10

[sprite]
variant = "a"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.observation.enabled);
        assert_eq!(config.observation.interval(), Duration::from_secs(10));
        assert_eq!(config.sprite.variant, "a");
        assert_eq!(config.pipeline.artifact_poll_ms, 100);
    }

    #[test]
    fn parse_error_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_endpoints() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "MURASAME_API_KEY" => Some("sk-test".into()),
            "MURASAME_CHAT_URL" => Some("http://gpu-box:28565/chat".into()),
            _ => None,
        });
        assert_eq!(config.endpoints.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.endpoints.chat_url, "http://gpu-box:28565/chat");
        assert_eq!(config.endpoints.vision_url, default_vision_url());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.endpoints.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
