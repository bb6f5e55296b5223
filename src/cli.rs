//! CLI domain: parse, route, help, output, and presentation only.
//! No generation logic here; the route table calls into the client.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{map_error, CliError};
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_attempts, format_models_json, format_models_text, format_records,
    format_recovery_report,
};
pub use route::RunContext;
