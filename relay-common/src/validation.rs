//! Configuration validation.
//!
//! Runs once at startup, before any network activity. A failed validation
//! is fatal.

use thiserror::Error;

use crate::config::{
    Config, ConversationConfig, InferenceConfig, ObservabilityConfig, TelegramConfig,
};

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.telegram.validate() {
            errors.push(e);
        }
        if let Err(e) = self.inference.validate() {
            errors.push(e);
        }
        if let Err(e) = self.conversation.validate() {
            errors.push(e);
        }
        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for TelegramConfig {
    fn validate(&self) -> ValidationResult<()> {
        let has_token = self
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_token {
            return Err(ValidationError::MissingField {
                field: "telegram.bot_token (TELEGRAM_BOT_TOKEN)".into(),
            });
        }

        if self.allowed_users.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "telegram.allowed_users".into(),
                reason: "must contain at least one entry (use \"*\" to allow everyone)".into(),
            });
        }

        Ok(())
    }
}

impl Validate for InferenceConfig {
    fn validate(&self) -> ValidationResult<()> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ValidationError::InvalidValue {
                    field: "inference.base_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ValidationError::InvalidValue {
                    field: "inference.base_url".into(),
                    reason: e.to_string(),
                });
            }
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "inference.model".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "inference.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        if self.max_tokens == 0 {
            return Err(ValidationError::InvalidValue {
                field: "inference.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "inference.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ConversationConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.history_depth < 2 {
            return Err(ValidationError::InvalidValue {
                field: "conversation.history_depth".into(),
                reason: "must hold at least one user/assistant pair (>= 2)".into(),
            });
        }

        if self.max_message_len == 0 || self.max_message_len > TELEGRAM_MESSAGE_LIMIT {
            return Err(ValidationError::InvalidValue {
                field: "conversation.max_message_len".into(),
                reason: format!("must be between 1 and {TELEGRAM_MESSAGE_LIMIT}"),
            });
        }

        if self.error_message.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "conversation.error_message".into(),
            });
        }

        // Sent as one message, never split.
        if self.error_message.chars().count() > TELEGRAM_MESSAGE_LIMIT {
            return Err(ValidationError::InvalidValue {
                field: "conversation.error_message".into(),
                reason: format!("must be at most {TELEGRAM_MESSAGE_LIMIT} characters"),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
