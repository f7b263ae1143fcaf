//! Configuration management for Coachline
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest to highest: built-in defaults, YAML file,
//! `COACHLINE_*` environment variables, command-line flags.

use crate::error::{CoachlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Coachline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Streaming transport settings
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// First-reply polling settings
    #[serde(default)]
    pub polling: PollingConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the coaching API (e.g. `http://localhost:8080/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Athlete id used to address conversations
    #[serde(default)]
    pub user_id: String,

    /// Coach id used to address conversations
    #[serde(default)]
    pub coach_id: String,

    /// Optional bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Timeout for one-shot requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: String::new(),
            coach_id: String::new(),
            auth_token: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Prefer the streaming endpoint when sending
    #[serde(default = "default_streaming_enabled")]
    pub enabled: bool,
}

fn default_streaming_enabled() -> bool {
    true
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: default_streaming_enabled(),
        }
    }
}

/// Polling configuration for conversations awaiting their first reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between re-fetches
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,

    /// Wall-clock budget of one polling session (seconds)
    #[serde(default = "default_poll_timeout")]
    pub timeout_seconds: u64,
}

fn default_poll_interval() -> u64 {
    3
}

fn default_poll_timeout() -> u64 {
    90
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval(),
            timeout_seconds: default_poll_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for the `coachline` target (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoachlineError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CoachlineError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("COACHLINE_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(user_id) = std::env::var("COACHLINE_USER_ID") {
            self.api.user_id = user_id;
        }

        if let Ok(coach_id) = std::env::var("COACHLINE_COACH_ID") {
            self.api.coach_id = coach_id;
        }

        if let Ok(token) = std::env::var("COACHLINE_AUTH_TOKEN") {
            self.api.auth_token = Some(token);
        }

        if let Ok(timeout) = std::env::var("COACHLINE_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid COACHLINE_REQUEST_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(enabled) = std::env::var("COACHLINE_STREAMING") {
            match enabled.parse::<bool>() {
                Ok(v) => {
                    self.streaming.enabled = v;
                    tracing::debug!(enabled = v, "Env override: COACHLINE_STREAMING");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for COACHLINE_STREAMING: {}", enabled);
                }
            }
        }

        if let Ok(interval) = std::env::var("COACHLINE_POLL_INTERVAL_SECONDS") {
            if let Ok(value) = interval.parse() {
                self.polling.interval_seconds = value;
            } else {
                tracing::warn!("Invalid COACHLINE_POLL_INTERVAL_SECONDS: {}", interval);
            }
        }

        if let Ok(timeout) = std::env::var("COACHLINE_POLL_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.polling.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid COACHLINE_POLL_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(level) = std::env::var("COACHLINE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(user) = &cli.user {
            self.api.user_id = user.clone();
        }
        if let Some(coach) = &cli.coach {
            self.api.coach_id = coach.clone();
        }
        if cli.json_logs {
            self.logging.json = true;
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CoachlineError::Config("api.base_url cannot be empty".to_string()).into());
        }

        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(CoachlineError::Config(format!(
                "api.base_url is not a valid URL: {}",
                e
            ))
            .into());
        }

        if self.api.request_timeout_seconds == 0 {
            return Err(CoachlineError::Config(
                "api.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.polling.interval_seconds == 0 {
            return Err(CoachlineError::Config(
                "polling.interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.polling.timeout_seconds == 0 {
            return Err(CoachlineError::Config(
                "polling.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.polling.interval_seconds >= self.polling.timeout_seconds {
            return Err(CoachlineError::Config(
                "polling.interval_seconds must be less than polling.timeout_seconds".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Validate that the ids needed to address a conversation are present
    ///
    /// # Errors
    ///
    /// Returns error if `api.user_id` or `api.coach_id` is empty
    pub fn require_identity(&self) -> Result<()> {
        if self.api.user_id.trim().is_empty() {
            return Err(CoachlineError::Config(
                "api.user_id is required (config, COACHLINE_USER_ID, or --user)".to_string(),
            )
            .into());
        }
        if self.api.coach_id.trim().is_empty() {
            return Err(CoachlineError::Config(
                "api.coach_id is required (config, COACHLINE_COACH_ID, or --coach)".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
