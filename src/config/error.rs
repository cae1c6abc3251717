//! Configuration Error Types
//!
//! Errors raised while loading and validating [`ResilienceSettings`](super::ResilienceSettings).

use thiserror::Error;

/// Settings loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The layered sources could not be read or deserialized
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// The settings file does not exist
    #[error("Settings file not found: {path}")]
    FileNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
