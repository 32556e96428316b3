//! Error taxonomy for the proctoring core.
//!
//! Lifecycle and capability calls (start/stop, enable/disable, fullscreen probes) keep a
//! boolean contract and never surface these errors to callers; `ProctorError` covers the
//! fallible collaborators around them (URL parsing, session storage, configuration) and
//! the per-subscriber failure reports kept by the registry.

use thiserror::Error;

/// Errors produced by the proctoring core and its collaborators.
#[derive(Debug, Error)]
pub enum ProctorError {
    /// A required browser API is missing on the host.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A subscriber callback panicked while handling an event.
    #[error("Subscriber {subscriber} failed: {message}")]
    CallbackFailure { subscriber: u64, message: String },

    #[error("Invalid assessment URL: {0}")]
    InvalidAssessmentUrl(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<sled::Error> for ProctorError {
    fn from(e: sled::Error) -> Self {
        ProctorError::Store(e.to_string())
    }
}

pub type ProctorResult<T> = Result<T, ProctorError>;
