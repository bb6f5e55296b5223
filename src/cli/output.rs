//! CLI output: error type and user-facing error messages.

use crate::config::ValidationError;
use crate::error::{GenerationError, ParseError};
use owo_colors::OwoColorize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration:\n{}", format_validation(.0))]
    Invalid(Vec<ValidationError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),

    #[error("Failed to render output: {0}")]
    Render(String),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message printed for a failed command, with a hint where one helps.
pub fn map_error(err: &CliError) -> String {
    let hint = match err {
        CliError::Generation(GenerationError::NotConfigured(_)) => {
            Some("export GEMINI_API_KEY=... or set api.api_key in tether.toml")
        }
        CliError::Generation(GenerationError::Exhausted { .. }) => {
            Some("run `tether models --refresh` to update the candidate list")
        }
        CliError::Parse(ParseError::UnrecoverableOutput { .. }) => {
            Some("the text does not contain a recoverable array of objects")
        }
        _ => None,
    };
    let mut message = format!("{} {}", "error:".red().bold(), err);
    if let Some(hint) = hint {
        message.push_str(&format!("\n{} {}", "hint:".yellow(), hint));
    }
    message
}
