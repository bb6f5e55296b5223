//! Command-name contract used for log fields.

use crate::cli::parse::Commands;

/// Stable command name (e.g. "generate", "models").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { stream: true, .. } => "generate.stream",
        Commands::Generate { grounded: true, .. } => "generate.grounded",
        Commands::Generate { .. } => "generate",
        Commands::Models { .. } => "models",
        Commands::Repair { .. } => "repair",
        Commands::Config { .. } => "config",
    }
}
