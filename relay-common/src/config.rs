//! Configuration management for the relay.
//!
//! The relay reads an optional file at `~/.vllm-relay/config.json` and then
//! applies environment variable overrides on top of it.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Telegram
//! - `TELEGRAM_BOT_TOKEN` → telegram.bot_token (required)
//! - `TELEGRAM_ALLOWED_USERS` → telegram.allowed_users (comma separated)
//!
//! ## Inference endpoint
//! - `VLLM_BASE_URL` → inference.base_url
//! - `VLLM_API_KEY` → inference.api_key
//! - `VLLM_MODEL` → inference.model
//! - `VLLM_TEMPERATURE` → inference.temperature
//! - `VLLM_MAX_TOKENS` → inference.max_tokens
//! - `VLLM_TIMEOUT_SECS` → inference.timeout_secs
//!
//! ## Conversation
//! - `RELAY_HISTORY_DEPTH` → conversation.history_depth
//! - `RELAY_MAX_MESSAGE_LEN` → conversation.max_message_len
//! - `RELAY_SYSTEM_PROMPT` → conversation.system_prompt
//!
//! ## Logging
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_LOG_FORMAT` → observability.log_format

use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".vllm-relay"),
        |dirs| dirs.home_dir().join(".vllm-relay"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Inference endpoint settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// History and reply settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load `~/.vllm-relay/config.json` (defaults if absent), apply
    /// environment overrides and validate.
    ///
    /// Runs before logging is set up, so it does not log; every failure
    /// comes back as a configuration error.
    pub fn load_checked() -> crate::Result<Self> {
        Self::load_checked_from(&config_path(), |key| std::env::var(key).ok())
    }

    /// Like `load_checked`, with an explicit file and variable lookup.
    pub fn load_checked_from<F>(path: &Path, lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            Self::load_from(path).map_err(|e| Error::Config(format!("{e:#}")))?
        } else {
            Self::default()
        };

        config.apply_overrides_from(lookup);
        config
            .validate()
            .map_err(|e| Error::from(e).with_context("Invalid configuration"))?;

        Ok(config)
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(users) = lookup("TELEGRAM_ALLOWED_USERS") {
            self.telegram.allowed_users = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(url) = lookup("VLLM_BASE_URL") {
            self.inference.base_url = url;
        }
        if let Some(key) = lookup("VLLM_API_KEY") {
            self.inference.api_key = key;
        }
        if let Some(model) = lookup("VLLM_MODEL") {
            self.inference.model = model;
        }
        parse_override(&lookup, "VLLM_TEMPERATURE", &mut self.inference.temperature);
        parse_override(&lookup, "VLLM_MAX_TOKENS", &mut self.inference.max_tokens);
        parse_override(&lookup, "VLLM_TIMEOUT_SECS", &mut self.inference.timeout_secs);

        parse_override(
            &lookup,
            "RELAY_HISTORY_DEPTH",
            &mut self.conversation.history_depth,
        );
        parse_override(
            &lookup,
            "RELAY_MAX_MESSAGE_LEN",
            &mut self.conversation.max_message_len,
        );
        if let Some(prompt) = lookup("RELAY_SYSTEM_PROMPT") {
            self.conversation.system_prompt = prompt;
        }

        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Get the Telegram bot token, treating blank values as absent.
    pub fn telegram_bot_token(&self) -> Option<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn parse_override<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(variable = key, value = %raw, "Ignoring unparsable override"),
    }
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Required at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Usernames or numeric user ids allowed to talk to the bot (`*` = anyone)
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_poll_timeout() -> u64 {
    30
}

// ============================================================================
// Inference
// ============================================================================

/// OpenAI-compatible inference endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL including the API version prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum output tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ask the chat template to skip the reasoning ("thinking") section
    #[serde(default = "default_true")]
    pub disable_thinking: bool,

    /// Whole-request timeout for one completion call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            disable_thinking: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8555/v1".to_string()
}

fn default_api_key() -> String {
    "EMPTY".to_string()
}

fn default_model() -> String {
    "Qwen/Qwen3-14b".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Conversation
// ============================================================================

/// History depth, reply chunking and the fixed user-facing texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum number of stored turns per user
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Maximum characters per outgoing message
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Reply to `/start`
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Reply to `/reset`
    #[serde(default = "default_reset_message")]
    pub reset_message: String,

    /// Sent when the inference call fails
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            max_message_len: default_max_message_len(),
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
            reset_message: default_reset_message(),
            error_message: default_error_message(),
        }
    }
}

fn default_history_depth() -> usize {
    6
}

fn default_max_message_len() -> usize {
    4096
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Answer briefly and to the point.".to_string()
}

fn default_greeting() -> String {
    "Hi! Send me a text message and I will answer using the language model.".to_string()
}

fn default_reset_message() -> String {
    "Conversation history cleared.".to_string()
}

fn default_error_message() -> String {
    concat!(
        "Sorry, something went wrong while processing your request. ",
        "Please check the inference server settings."
    )
    .to_string()
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Aliases: "level"
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    /// Aliases: "format"
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to set to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
