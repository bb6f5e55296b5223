//! CLI route: run context and the single command dispatch table.

use crate::cli::output::CliError;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_attempts, format_models_json, format_models_text, format_records,
    format_recovery_report,
};
use crate::client::GenerationClient;
use crate::config::{ConfigLoader, TetherConfig};
use crate::repair::OutputRepairParser;
use crate::types::{GenerationResult, Purpose, RequestSpec};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: loaded configuration and project root.
pub struct RunContext {
    config: TetherConfig,
    project_root: PathBuf,
}

impl RunContext {
    /// Load configuration for `project_root`, with `config_path` layered on top.
    pub fn new(project_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = ConfigLoader::load_with(&project_root, config_path.as_deref())?;
        Ok(Self {
            config,
            project_root,
        })
    }

    /// Context over an already-built configuration
    pub fn with_config(project_root: PathBuf, config: TetherConfig) -> Self {
        Self {
            config,
            project_root,
        }
    }

    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Execute `command`; the returned text is printed by the caller.
    pub async fn execute(&self, command: &Commands, cancel: &CancellationToken) -> Result<String, CliError> {
        match command {
            Commands::Config { validate } => self.handle_config(*validate),
            Commands::Repair { file, report } => handle_repair(file.as_deref(), *report),
            Commands::Models {
                refresh,
                purpose,
                format,
            } => self.handle_models(*refresh, *purpose, *format).await,
            Commands::Generate {
                prompt,
                instruction,
                purpose,
                stream,
                grounded,
                json,
                temperature,
                max_output_tokens,
                show_attempts,
            } => {
                let client = self.client()?;
                let prompt = match prompt {
                    Some(prompt) => prompt.clone(),
                    None => read_input(None)?,
                };
                if prompt.trim().is_empty() {
                    return Err(CliError::Usage("prompt is empty".to_string()));
                }

                let mut request = client.request(prompt).with_purpose(*purpose);
                if let Some(instruction) = instruction {
                    request = request.with_instruction(instruction.clone());
                }
                if let Some(temperature) = temperature {
                    request.params.temperature = *temperature;
                }
                if let Some(max_output_tokens) = max_output_tokens {
                    request.params.max_output_tokens = *max_output_tokens;
                }
                if *json {
                    request = request.json_output();
                }

                let mode = if *grounded {
                    GenerateMode::Grounded
                } else if *stream {
                    GenerateMode::Streamed
                } else {
                    GenerateMode::Single
                };
                let result = run_generate(&client, &request, mode, cancel).await?;
                render_generation(&client, &result, mode, *json, *show_attempts)
            }
        }
    }

    fn client(&self) -> Result<GenerationClient, CliError> {
        self.config.validate().map_err(CliError::Invalid)?;
        Ok(GenerationClient::from_config(&self.config)?)
    }

    fn handle_config(&self, validate: bool) -> Result<String, CliError> {
        if validate {
            self.config.validate().map_err(CliError::Invalid)?;
            return Ok("Configuration is valid".to_string());
        }
        self.config
            .to_toml()
            .map_err(|e| CliError::Render(e.to_string()))
    }

    async fn handle_models(
        &self,
        refresh: bool,
        purpose: Purpose,
        format: OutputFormat,
    ) -> Result<String, CliError> {
        let client = self.client()?;
        if refresh {
            let outcome = client.refresh_models().await;
            info!(outcome = ?outcome, "Model refresh finished");
        }
        let models = client.ordered_models(purpose);
        match format {
            OutputFormat::Text => Ok(format_models_text(&models)),
            OutputFormat::Json => {
                format_models_json(&models).map_err(|e| CliError::Render(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenerateMode {
    Single,
    Streamed,
    Grounded,
}

async fn run_generate(
    client: &GenerationClient,
    request: &RequestSpec,
    mode: GenerateMode,
    cancel: &CancellationToken,
) -> Result<GenerationResult, CliError> {
    debug!(?mode, purpose = ?request.purpose, "Running generate command");
    let result = match mode {
        GenerateMode::Single => client.generate_detailed(request, cancel).await?,
        GenerateMode::Grounded => client.generate_grounded(request, cancel).await?,
        GenerateMode::Streamed => {
            let mut printer = DeltaPrinter::new(std::io::stdout(), cancel.clone());
            let result = client
                .generate_streaming_detailed(request, |text: &str| printer.show(text), cancel)
                .await?;
            printer.finish();
            result
        }
    };
    Ok(result)
}

fn render_generation(
    client: &GenerationClient,
    result: &GenerationResult,
    mode: GenerateMode,
    json: bool,
    show_attempts: bool,
) -> Result<String, CliError> {
    let mut sections = Vec::new();

    if json {
        let records = client.parse_structured_output(&result.text)?;
        sections.push(format_records(&records).map_err(|e| CliError::Render(e.to_string()))?);
    } else if mode != GenerateMode::Streamed {
        sections.push(result.text.clone());
    }

    if let Some(grounding) = &result.grounding {
        if !grounding.web_search_queries.is_empty() {
            sections.push(format!(
                "Searched: {}",
                grounding.web_search_queries.join("; ")
            ));
        }
    }
    if show_attempts {
        sections.push(format_attempts(&result.attempts));
    }
    Ok(sections.join("\n\n"))
}

fn handle_repair(file: Option<&Path>, report: bool) -> Result<String, CliError> {
    let text = read_input(file)?;
    let parser = OutputRepairParser::default();
    let recovery = parser.parse_with_report(&text);
    let table = report.then(|| format_recovery_report(&recovery));
    let records = recovery.into_result()?;
    let rendered = format_records(&records).map_err(|e| CliError::Render(e.to_string()))?;
    Ok(match table {
        Some(table) => format!("{}\n\n{}", table, rendered),
        None => rendered,
    })
}

fn read_input(file: Option<&Path>) -> Result<String, CliError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

/// Prints only the newly arrived suffix of the running text. A retried
/// attempt restarts from empty, so a shorter text starts a fresh line.
/// Once a write fails nothing more is printed; a closed pipe also cancels
/// the call.
struct DeltaPrinter<W: Write> {
    out: W,
    shown: String,
    cancel: CancellationToken,
    closed: bool,
}

impl<W: Write> DeltaPrinter<W> {
    fn new(out: W, cancel: CancellationToken) -> Self {
        Self {
            out,
            shown: String::new(),
            cancel,
            closed: false,
        }
    }

    fn show(&mut self, text: &str) {
        let delta = self.delta(text);
        self.emit(&delta);
    }

    fn finish(&mut self) {
        self.emit("\n");
    }

    fn emit(&mut self, text: &str) {
        if self.closed {
            return;
        }
        let written = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(err) = written {
            self.closed = true;
            if err.kind() == ErrorKind::BrokenPipe {
                debug!("Output closed; cancelling generation");
                self.cancel.cancel();
            } else {
                warn!(error = %err, "Streamed output could not be written");
            }
        }
    }

    fn delta(&mut self, text: &str) -> String {
        let delta = match text.strip_prefix(self.shown.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("\n{}", text),
        };
        self.shown = text.to_string();
        delta
    }
}
