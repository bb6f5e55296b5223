//! CLI parse: clap types for tether. No behavior; definitions only.

use crate::types::Purpose;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tether CLI - resilient generation client
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Resilient text generation with model fallback and structured-output repair")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root used to find tether.toml and config/{env}.toml
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file path (layered above project files)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate text from a prompt
    Generate {
        /// Prompt text; read from stdin when omitted
        prompt: Option<String>,

        /// System instruction
        #[arg(long)]
        instruction: Option<String>,

        /// Which capability class to try first
        #[arg(long, default_value = "fast", value_parser = parse_purpose)]
        purpose: Purpose,

        /// Print text as it streams in
        #[arg(long, conflicts_with = "grounded")]
        stream: bool,

        /// Ground the answer with web search
        #[arg(long)]
        grounded: bool,

        /// Ask for JSON and print the recovered records
        #[arg(long)]
        json: bool,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,

        /// Output length cap in tokens
        #[arg(long)]
        max_output_tokens: Option<u32>,

        /// Print the attempt history after the text
        #[arg(long)]
        show_attempts: bool,
    },
    /// List candidate models in dispatch order
    Models {
        /// Run model discovery first
        #[arg(long)]
        refresh: bool,

        /// Ordering purpose
        #[arg(long, default_value = "fast", value_parser = parse_purpose)]
        purpose: Purpose,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Recover structured records from malformed generated text
    Repair {
        /// Input file; read from stdin when omitted
        file: Option<PathBuf>,

        /// Show which recovery strategies ran
        #[arg(long)]
        report: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Only validate, print problems
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_purpose(raw: &str) -> Result<Purpose, String> {
    raw.parse()
}
