//! Structured-output recovery.
//!
//! Generated text that should be a JSON array of objects often arrives
//! fenced in markdown, with raw newlines inside strings, trailing commas or a
//! truncated tail. [`OutputRepairParser`] runs a fixed ladder of recovery
//! strategies, each an independent pure function of the input, and returns
//! the first non-empty collection of objects one of them produces.
//!
//! | # | Strategy | Transform before parsing |
//! |---|----------|--------------------------|
//! | 1 | `Strict` | fence strip, array region |
//! | 2 | `Sanitized` | + drop control chars, escape breaks inside strings, drop trailing commas |
//! | 3 | `Flattened` | + collapse every whitespace run, strings included |
//! | 4 | `SalvageObjects` | parse each balanced `{...}` alone, keep those with a marker field |
//! | 5 | `Literal` | relaxed object-literal reader over the flattened text |

use crate::error::ParseError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info, warn};

pub mod literal;
pub mod scan;

/// One recovered record: always a JSON object
pub type ParsedRecord = Map<String, Value>;

/// Field names that identify a salvaged object as a real record
pub const DEFAULT_MARKER_FIELDS: &[&str] = &["title", "id", "imagePrompt"];

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Strict,
    Sanitized,
    Flattened,
    SalvageObjects,
    Literal,
}

impl RecoveryStrategy {
    pub const ALL: [RecoveryStrategy; 5] = [
        RecoveryStrategy::Strict,
        RecoveryStrategy::Sanitized,
        RecoveryStrategy::Flattened,
        RecoveryStrategy::SalvageObjects,
        RecoveryStrategy::Literal,
    ];

    /// 1-based position in the ladder
    pub fn index(self) -> usize {
        match self {
            RecoveryStrategy::Strict => 1,
            RecoveryStrategy::Sanitized => 2,
            RecoveryStrategy::Flattened => 3,
            RecoveryStrategy::SalvageObjects => 4,
            RecoveryStrategy::Literal => 5,
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::Strict => "strict",
            RecoveryStrategy::Sanitized => "sanitized",
            RecoveryStrategy::Flattened => "flattened",
            RecoveryStrategy::SalvageObjects => "salvage_objects",
            RecoveryStrategy::Literal => "literal",
        };
        f.write_str(name)
    }
}

/// Outcome of one strategy within a parse call
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryAttempt {
    pub strategy: RecoveryStrategy,
    pub success: bool,
    /// Present on the winning attempt only
    pub records: Option<Vec<ParsedRecord>>,
    pub error: Option<ParseError>,
}

/// Every attempt made by one parse call, in ladder order
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub attempts: Vec<RecoveryAttempt>,
    preview: String,
}

impl RecoveryReport {
    /// Strategy that produced the records, if any did
    pub fn winner(&self) -> Option<RecoveryStrategy> {
        self.attempts.iter().find(|a| a.success).map(|a| a.strategy)
    }

    pub fn records(&self) -> Option<&[ParsedRecord]> {
        self.attempts
            .iter()
            .find_map(|a| a.records.as_deref())
    }

    pub fn into_result(self) -> Result<Vec<ParsedRecord>, ParseError> {
        let attempts = self.attempts.len();
        self.attempts
            .into_iter()
            .find_map(|a| a.records)
            .ok_or(ParseError::UnrecoverableOutput {
                attempts,
                preview: self.preview,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRepairParser {
    marker_fields: Vec<String>,
}

impl Default for OutputRepairParser {
    fn default() -> Self {
        Self::with_marker_fields(DEFAULT_MARKER_FIELDS.iter().copied())
    }
}

impl OutputRepairParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser whose object salvage keeps objects carrying any of `fields`
    pub fn with_marker_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            marker_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn marker_fields(&self) -> &[String] {
        &self.marker_fields
    }

    /// Recover an ordered, non-empty collection of records from `text`.
    pub fn parse(&self, text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
        self.parse_with_report(text).into_result()
    }

    /// Like [`parse`](Self::parse), keeping the per-strategy outcomes.
    pub fn parse_with_report(&self, text: &str) -> RecoveryReport {
        debug!(length = text.len(), "Parsing structured output");
        let mut attempts = Vec::with_capacity(RecoveryStrategy::ALL.len());

        for strategy in RecoveryStrategy::ALL {
            match self.apply(strategy, text) {
                Ok(records) => {
                    info!(
                        strategy = %strategy,
                        records = records.len(),
                        "Structured output recovered"
                    );
                    attempts.push(RecoveryAttempt {
                        strategy,
                        success: true,
                        records: Some(records),
                        error: None,
                    });
                    break;
                }
                Err(err) => {
                    debug!(strategy = %strategy, error = %err, "Recovery strategy failed");
                    attempts.push(RecoveryAttempt {
                        strategy,
                        success: false,
                        records: None,
                        error: Some(err),
                    });
                }
            }
        }

        if !attempts.iter().any(|a| a.success) {
            warn!(
                strategies = attempts.len(),
                "Structured output could not be recovered"
            );
        }

        RecoveryReport {
            attempts,
            preview: preview(text),
        }
    }

    /// Recover records and deserialize each into `T`.
    pub fn parse_as<T: DeserializeOwned>(&self, text: &str) -> Result<Vec<T>, ParseError> {
        self.parse(text)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                serde_json::from_value(Value::Object(record))
                    .map_err(|e| ParseError::Malformed(format!("record {}: {}", i, e)))
            })
            .collect()
    }

    /// Run a single strategy against `text`.
    pub fn apply(
        &self,
        strategy: RecoveryStrategy,
        text: &str,
    ) -> Result<Vec<ParsedRecord>, ParseError> {
        match strategy {
            RecoveryStrategy::Strict => strict(text),
            RecoveryStrategy::Sanitized => sanitized(text),
            RecoveryStrategy::Flattened => flattened(text),
            RecoveryStrategy::SalvageObjects => salvage_objects(text, &self.marker_fields),
            RecoveryStrategy::Literal => literal_expression(text),
        }
    }
}

/// Recover records from `text` with the default marker fields.
pub fn parse_structured_output(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    OutputRepairParser::default().parse(text)
}

fn region(text: &str) -> &str {
    scan::array_region(scan::strip_fences(text))
}

fn sanitize(text: &str) -> String {
    let text = scan::strip_control_chars(text);
    let text = scan::escape_breaks_in_strings(&text);
    scan::strip_trailing_commas(&text)
}

/// Strategy 1: strict parse of the array region.
pub fn strict(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    parse_records(region(text))
}

/// Strategy 2: strict parse after string-aware sanitizing.
pub fn sanitized(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    parse_records(&sanitize(region(text)))
}

/// Strategy 3: strategy 2 plus global whitespace collapsing.
pub fn flattened(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    let text = scan::strip_control_chars(region(text));
    let text = scan::collapse_whitespace(&text);
    parse_records(&scan::strip_trailing_commas(&text))
}

/// Strategy 4: salvage intact objects that carry a marker field.
pub fn salvage_objects<S: AsRef<str>>(
    text: &str,
    marker_fields: &[S],
) -> Result<Vec<ParsedRecord>, ParseError> {
    let candidates = scan::balanced_objects(scan::strip_fences(text));
    let total = candidates.len();
    let records: Vec<ParsedRecord> = candidates
        .into_iter()
        .filter_map(|candidate| {
            serde_json::from_str::<ParsedRecord>(candidate)
                .or_else(|_| serde_json::from_str::<ParsedRecord>(&sanitize(candidate)))
                .ok()
        })
        .filter(|record| has_marker(record, marker_fields))
        .collect();

    if records.is_empty() {
        return Err(ParseError::Malformed(format!(
            "no intact marked object among {} candidates",
            total
        )));
    }
    Ok(records)
}

/// Strategy 5: relaxed literal reading of the flattened region.
pub fn literal_expression(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    let text = scan::strip_control_chars(region(text));
    let value = literal::parse_literal(&scan::collapse_whitespace(&text))
        .map_err(ParseError::Malformed)?;
    into_records(value)
}

fn parse_records(text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::Malformed(e.to_string()))?;
    into_records(value)
}

// A usable collection is a non-empty array whose every element is an object
fn into_records(value: Value) -> Result<Vec<ParsedRecord>, ParseError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ParseError::Malformed(format!(
                "expected an array, found {}",
                kind(&other)
            )))
        }
    };
    if items.is_empty() {
        return Err(ParseError::Malformed("empty array".to_string()));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(ParseError::Malformed(format!(
                "element {} is {}, not an object",
                i,
                kind(&other)
            ))),
        })
        .collect()
}

fn has_marker<S: AsRef<str>>(record: &ParsedRecord, marker_fields: &[S]) -> bool {
    marker_fields
        .iter()
        .any(|field| record.get(field.as_ref()).map_or(false, is_truthy))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
