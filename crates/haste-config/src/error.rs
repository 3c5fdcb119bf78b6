//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors
    #[error("root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("cache directory is not a directory: {0}")]
    CacheDirNotDirectory(PathBuf),

    // Config parsing/loading errors
    #[error("config not found")]
    NotFound,

    #[error("invalid config value for '{field}': {hint}")]
    InvalidValue { field: String, hint: String },

    // Schema validation errors (no filesystem checks)
    #[error("no roots specified")]
    NoRoots,

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Hint text suitable for rendering under the error message.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::SchemaValidation { hint, .. } => hint.as_deref(),
            ConfigError::InvalidValue { hint, .. } => Some(hint),
            ConfigError::NoRoots => Some("Add at least one directory to 'roots'"),
            _ => None,
        }
    }
}
