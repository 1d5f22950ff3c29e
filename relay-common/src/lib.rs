//! Relay Common - shared configuration, errors and logging for the vLLM relay.
//!
//! This crate provides:
//! - Configuration types, file loading and environment overrides
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Small string utilities used in logs

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, ConversationConfig, InferenceConfig, ObservabilityConfig, TelegramConfig,
};
pub use error::{Error, Result, EXIT_CONFIG};
pub use validation::{Validate, ValidationError, ValidationResult};

