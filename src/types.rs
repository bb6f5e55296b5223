//! Core domain types shared by the catalog, dispatcher, stream consumer and facade.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a request is optimised for; decides which capability class is tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    #[default]
    Fast,
    Quality,
}

impl Purpose {
    /// Capability class placed at the front of the candidate list.
    pub fn preferred_class(self) -> CapabilityClass {
        match self {
            Purpose::Fast => CapabilityClass::Fast,
            Purpose::Quality => CapabilityClass::Quality,
        }
    }
}

impl std::str::FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Purpose::Fast),
            "quality" => Ok(Purpose::Quality),
            other => Err(format!(
                "Invalid purpose: {} (must be 'fast' or 'quality')",
                other
            )),
        }
    }
}

/// Capability class of one backend model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityClass {
    Fast,
    Quality,
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityClass::Fast => write!(f, "fast"),
            CapabilityClass::Quality => write!(f, "quality"),
        }
    }
}

/// Generation parameters forwarded to the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Response shape hint, e.g. `application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Token budget for internal reasoning; 0 disables it
    #[serde(default)]
    pub thinking_budget: u32,
}

impl GenerationParams {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
    /// Output cap used by grounded requests
    pub const GROUNDED_MAX_OUTPUT_TOKENS: u32 = 4096;
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: Self::DEFAULT_TEMPERATURE,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
            response_mime_type: None,
            thinking_budget: 0,
        }
    }
}

/// One logical generation request. Owned by the call that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
    #[serde(default)]
    pub purpose: Purpose,
    /// Attach the search-grounding tool to the request
    #[serde(default)]
    pub grounded: bool,
}

impl RequestSpec {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            instruction: None,
            params: GenerationParams::default(),
            purpose: Purpose::default(),
            grounded: false,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn json_output(mut self) -> Self {
        self.params.response_mime_type = Some("application/json".to_string());
        self
    }
}

/// A content part returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Text meant for the user
    Visible(String),
    /// Internal reasoning; never surfaced
    Reasoning(String),
}

impl ContentPart {
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            ContentPart::Visible(text) => Some(text),
            ContentPart::Reasoning(_) => None,
        }
    }
}

/// Concatenate visible parts in order, no separator.
pub fn join_visible(parts: &[ContentPart]) -> String {
    parts.iter().filter_map(ContentPart::visible_text).collect()
}

/// Outcome of a single dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcomeKind {
    Success,
    RateLimited,
    NotFound,
    OtherError,
}

impl fmt::Display for AttemptOutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptOutcomeKind::Success => "success",
            AttemptOutcomeKind::RateLimited => "rate_limited",
            AttemptOutcomeKind::NotFound => "not_found",
            AttemptOutcomeKind::OtherError => "other_error",
        };
        f.write_str(s)
    }
}

/// Diagnostic record of one (model, attempt) pair in a dispatch chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub model: String,
    pub attempt: u32,
    pub outcome: AttemptOutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_before_retry: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Search grounding metadata attached to a grounded response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingMetadata {
    #[serde(default)]
    pub web_search_queries: Vec<String>,
}

/// Final result of a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model: String,
    /// Chunks delivered in order; empty for single-shot calls
    #[serde(default)]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMetadata>,
}
