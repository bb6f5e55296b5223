//! CLI presentation: tables and JSON views of command results.

use crate::catalog::ModelDescriptor;
use crate::repair::{ParsedRecord, RecoveryReport};
use crate::types::{AttemptOutcomeKind, AttemptRecord};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_models_text(models: &[ModelDescriptor]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Model", "Class", "Valid"]);
    for (i, model) in models.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            model.id.clone(),
            model.class.to_string(),
            if model.still_valid { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_models_json(models: &[ModelDescriptor]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(models)
}

pub fn format_attempts(attempts: &[AttemptRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Model", "Attempt", "Outcome", "Wait", "Error"]);
    for record in attempts {
        let outcome = match record.outcome {
            AttemptOutcomeKind::Success => record.outcome.green().to_string(),
            AttemptOutcomeKind::RateLimited => record.outcome.yellow().to_string(),
            AttemptOutcomeKind::NotFound | AttemptOutcomeKind::OtherError => {
                record.outcome.red().to_string()
            }
        };
        table.add_row(vec![
            record.model.clone(),
            record.attempt.to_string(),
            outcome,
            record
                .wait_before_retry
                .map(|w| format!("{:.1}s", w.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string()),
            record.error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_records(records: &[ParsedRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

pub fn format_recovery_report(report: &RecoveryReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Strategy", "Result", "Detail"]);
    for attempt in &report.attempts {
        let (result, detail) = if attempt.success {
            let count = attempt.records.as_ref().map_or(0, Vec::len);
            ("ok".green().to_string(), format!("{} records", count))
        } else {
            (
                "failed".red().to_string(),
                attempt
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            )
        };
        table.add_row(vec![
            attempt.strategy.index().to_string(),
            attempt.strategy.to_string(),
            result,
            detail,
        ]);
    }
    table.to_string()
}
