//! Wire format of the generation endpoint (request body, response body, error body).

use crate::types::{ContentPart, GroundingMetadata, RequestSpec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireInstruction>,
    generation_config: WireGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WireTextPart>,
}

#[derive(Debug, Serialize)]
struct WireTextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireInstruction {
    parts: Vec<WireTextPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    thinking_config: WireThinkingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_budget: u32,
}

impl WireRequest {
    pub(crate) fn from_spec(request: &RequestSpec) -> Self {
        let system_instruction = request.instruction.as_ref().map(|text| WireInstruction {
            parts: vec![WireTextPart { text: text.clone() }],
        });
        let tools = if request.grounded {
            vec![json!({ "googleSearchRetrieval": {} })]
        } else {
            Vec::new()
        };

        Self {
            contents: vec![WireContent {
                role: "user",
                parts: vec![WireTextPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction,
            generation_config: WireGenerationConfig {
                temperature: request.params.temperature,
                max_output_tokens: request.params.max_output_tokens,
                thinking_config: WireThinkingConfig {
                    thinking_budget: request.params.thinking_budget,
                },
                response_mime_type: request.params.response_mime_type.clone(),
            },
            tools,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireCandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<WireGrounding>,
}

#[derive(Debug, Default, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Deserialize)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGrounding {
    #[serde(default)]
    web_search_queries: Vec<String>,
}

impl WireResponse {
    /// Content parts of the first candidate, tagged visible or reasoning.
    /// Parts without text are dropped.
    pub(crate) fn into_parts(self) -> (Vec<ContentPart>, Option<GroundingMetadata>) {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return (Vec::new(), None);
        };

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| {
                let text = part.text.filter(|t| !t.is_empty())?;
                if part.thought.unwrap_or(false) {
                    Some(ContentPart::Reasoning(text))
                } else {
                    Some(ContentPart::Visible(text))
                }
            })
            .collect();

        let grounding = candidate.grounding_metadata.map(|g| GroundingMetadata {
            web_search_queries: g.web_search_queries,
        });

        (parts, grounding)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireErrorBody {
    #[serde(default)]
    pub(crate) error: Option<WireErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireErrorDetail {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) details: Vec<Value>,
}

impl WireErrorDetail {
    /// `retryDelay` from a `RetryInfo` detail entry, e.g. `"12s"`
    pub(crate) fn retry_delay(&self) -> Option<&str> {
        self.details
            .iter()
            .find_map(|d| d.get("retryDelay").and_then(Value::as_str))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireModelList {
    #[serde(default)]
    pub(crate) models: Vec<crate::provider::RemoteModel>,
    #[serde(default, rename = "nextPageToken")]
    pub(crate) next_page_token: Option<String>,
}
