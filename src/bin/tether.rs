//! Tether CLI Binary
//!
//! Command-line interface for resilient text generation.

use clap::Parser;
use std::io::{ErrorKind, Write};
use std::process;
use tether::cli::{command_name, map_error, Cli, RunContext};
use tether::config::ConfigLoader;
use tether::logging::{init_logging, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let command = command_name(&cli.command);
    info!(command, "Tether CLI starting");

    let context = match RunContext::new(cli.project.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling in-flight generation");
            on_interrupt.cancel();
        }
    });

    match context.execute(&cli.command, &cancel).await {
        Ok(output) => {
            info!(command, "Command completed successfully");
            if !output.is_empty() {
                if let Err(e) = writeln!(std::io::stdout().lock(), "{}", output) {
                    if e.kind() != ErrorKind::BrokenPipe {
                        error!("Failed to write output: {}", e);
                        process::exit(1);
                    }
                }
            }
        }
        Err(e) => {
            error!(command, "Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.project)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_logging_config_default() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from(["tether", "--project", root.as_ref(), "config"]).unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.output, "stderr", "default output keeps stdout clean");
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn test_build_logging_config_verbose() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from(["tether", "--project", root.as_ref(), "--verbose", "config"])
            .unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.level, "debug", "verbose should set level to debug");
    }

    #[test]
    fn test_build_logging_config_explicit_level_wins_over_verbose() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from([
            "tether",
            "--project",
            root.as_ref(),
            "--verbose",
            "--log-level",
            "trace",
            "--log-format",
            "json",
            "config",
        ])
        .unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.level, "trace");
        assert_eq!(config.format, "json");
    }

    #[test]
    fn test_config_file_logging_section_is_used() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"info\"\noutput = \"stdout\"\n").unwrap();
        let path = path.to_string_lossy();
        let cli = Cli::try_parse_from(["tether", "--config", path.as_ref(), "config"]).unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.level, "info");
        assert_eq!(config.output, "stdout");
    }
}
