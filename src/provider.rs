//! Generation Transport Abstraction
//!
//! The dispatcher talks to the remote generation endpoint through
//! [`GenerationTransport`]: one single-shot call, one streamed call and a model
//! listing call, each parameterized by model identifier. The HTTP
//! implementation lives in [`gemini`]; [`mock`] replays scripted outcomes.

use crate::error::UpstreamError;
use crate::types::{ContentPart, GroundingMetadata, RequestSpec};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub mod gemini;
pub mod mock;
pub(crate) mod wire;

pub use gemini::GeminiTransport;
pub use mock::{MockReply, MockTransport};

/// One decoded event from a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Raw event payload, expected to be a JSON response fragment
    Data(String),
    /// End-of-stream sentinel
    End,
}

/// Streamed response: frames in arrival order
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, UpstreamError>> + Send>>;

/// Single-shot response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub parts: Vec<ContentPart>,
    pub grounding: Option<GroundingMetadata>,
}

/// Model entry reported by the endpoint's listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteModel {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl RemoteModel {
    pub fn new(name: impl Into<String>, methods: &[&str]) -> Self {
        Self {
            name: name.into(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Identifier without the `models/` resource prefix
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

/// Transport to the remote generation endpoint
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Issue a single-shot request to `model`
    async fn generate(
        &self,
        model: &str,
        request: &RequestSpec,
    ) -> Result<GenerateResponse, UpstreamError>;

    /// Open a streamed request to `model`. Failures before the first frame
    /// are returned here; later failures arrive as stream items.
    async fn stream(&self, model: &str, request: &RequestSpec)
        -> Result<FrameStream, UpstreamError>;

    /// List models the credential can use
    async fn list_models(&self) -> Result<Vec<RemoteModel>, UpstreamError>;

    /// Get the transport name
    fn transport_name(&self) -> &str;
}
