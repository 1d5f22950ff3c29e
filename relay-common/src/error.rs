//! Startup error type for the relay.

use crate::validation::ValidationError;
use thiserror::Error;

/// Result type alias using the relay error type.
pub type Result<T> = std::result::Result<T, Error>;

/// `EX_CONFIG` from sysexits.h.
pub const EXIT_CONFIG: i32 = 78;

/// Errors that abort startup before the relay serves anything.
#[derive(Error, Debug)]
pub enum Error {
    /// The config file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The loaded configuration failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process exit code for this error when it aborts startup.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) => EXIT_CONFIG,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}
