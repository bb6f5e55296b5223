//! Error types for the generation client and the structured-output parser.

use std::time::Duration;
use thiserror::Error;

/// How the dispatcher reacts to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retry the same model after a backoff wait
    RateLimited,
    /// Skip to the next candidate without retrying
    Unavailable,
    /// Abort the whole chain
    Fatal,
}

/// Failure of a single request against one model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn class(&self) -> FailureClass {
        match self {
            UpstreamError::RateLimited { .. } => FailureClass::RateLimited,
            UpstreamError::ModelUnavailable(_) => FailureClass::Unavailable,
            UpstreamError::Transport(_)
            | UpstreamError::Upstream { .. }
            | UpstreamError::InvalidResponse(_) => FailureClass::Fatal,
        }
    }

    /// Server-suggested wait, if the upstream supplied one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UpstreamError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Transport(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            UpstreamError::Transport(format!("Connection error: {}", err))
        } else if err.is_decode() {
            UpstreamError::InvalidResponse(format!("Failed to decode response: {}", err))
        } else {
            UpstreamError::Transport(format!("HTTP error: {}", err))
        }
    }
}

fn format_models(models: &[String]) -> String {
    if models.is_empty() {
        "none".to_string()
    } else {
        models.join(", ")
    }
}

/// The single failure a caller of the generation client receives.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation client not configured: {0}")]
    NotConfigured(String),

    #[error("Generation failed: {cause} (models tried: {})", format_models(.models_tried))]
    Failed {
        cause: UpstreamError,
        models_tried: Vec<String>,
    },

    #[error(
        "All models exhausted: {} (models tried: {})",
        .last_cause.as_ref().map(|c| c.to_string()).unwrap_or_else(|| "no candidates".to_string()),
        format_models(.models_tried)
    )]
    Exhausted {
        last_cause: Option<UpstreamError>,
        models_tried: Vec<String>,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GenerationError {
    /// Model identifiers attempted, in order, without duplicates
    pub fn models_tried(&self) -> &[String] {
        match self {
            GenerationError::Failed { models_tried, .. }
            | GenerationError::Exhausted { models_tried, .. } => models_tried,
            _ => &[],
        }
    }

    /// Last concrete upstream cause, if any
    pub fn cause(&self) -> Option<&UpstreamError> {
        match self {
            GenerationError::Failed { cause, .. } => Some(cause),
            GenerationError::Exhausted { last_cause, .. } => last_cause.as_ref(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::ConfigError(err.to_string())
    }
}

/// Structured-output parse errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Malformed output: {0}")]
    Malformed(String),

    #[error("Unrecoverable output after {attempts} recovery strategies: {preview}")]
    UnrecoverableOutput { attempts: usize, preview: String },
}
