//! Scripted transport for tests and offline runs.
//!
//! Replies are queued per model and consumed in order. A model with no queued
//! reply answers as unavailable, which mirrors a decommissioned model.

use crate::error::UpstreamError;
use crate::provider::{
    FrameStream, GenerateResponse, GenerationTransport, RemoteModel, StreamFrame,
};
use crate::types::{ContentPart, GroundingMetadata, RequestSpec};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Visible text; streamed as a single frame
    Text(String),
    /// Explicit parts; streamed as one frame per part
    Parts(Vec<ContentPart>),
    /// Visible text plus grounding queries
    Grounded { text: String, queries: Vec<String> },
    /// Fail before any content
    Fail(UpstreamError),
    /// Stream these frames verbatim
    Frames(Vec<Result<StreamFrame, UpstreamError>>),
    /// Stream these frames, then never finish
    Hang(Vec<StreamFrame>),
}

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub model: String,
    pub streaming: bool,
    pub request: RequestSpec,
}

#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    models: Mutex<Option<Result<Vec<RemoteModel>, UpstreamError>>>,
    calls: Mutex<Vec<MockCall>>,
    list_calls: Mutex<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `model`
    pub fn reply(self, model: &str, reply: MockReply) -> Self {
        self.push_reply(model, reply);
        self
    }

    pub fn push_reply(&self, model: &str, reply: MockReply) {
        self.replies
            .lock()
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Answer listing calls with `models`
    pub fn with_models(self, models: Vec<RemoteModel>) -> Self {
        *self.models.lock() = Some(Ok(models));
        self
    }

    /// Fail listing calls with `err`
    pub fn with_listing_failure(self, err: UpstreamError) -> Self {
        *self.models.lock() = Some(Err(err));
        self
    }

    /// Every generate/stream call in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Models called, in order
    pub fn called_models(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.model.clone()).collect()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock()
    }

    /// Frame carrying one visible text part, shaped like the real endpoint's events
    pub fn text_frame(text: &str) -> StreamFrame {
        StreamFrame::Data(
            json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string(),
        )
    }

    /// Frame carrying one reasoning part
    pub fn thought_frame(text: &str) -> StreamFrame {
        StreamFrame::Data(
            json!({ "candidates": [{ "content": { "parts": [{ "text": text, "thought": true }] } }] })
                .to_string(),
        )
    }

    fn next_reply(&self, model: &str, streaming: bool, request: &RequestSpec) -> Option<MockReply> {
        self.calls.lock().push(MockCall {
            model: model.to_string(),
            streaming,
            request: request.clone(),
        });
        self.replies
            .lock()
            .get_mut(model)
            .and_then(|queue| queue.pop_front())
    }
}

fn unscripted(model: &str) -> UpstreamError {
    UpstreamError::ModelUnavailable(format!("models/{} is not found", model))
}

fn part_frame(part: &ContentPart) -> StreamFrame {
    match part {
        ContentPart::Visible(text) => MockTransport::text_frame(text),
        ContentPart::Reasoning(text) => MockTransport::thought_frame(text),
    }
}

#[async_trait]
impl GenerationTransport for MockTransport {
    async fn generate(
        &self,
        model: &str,
        request: &RequestSpec,
    ) -> Result<GenerateResponse, UpstreamError> {
        match self.next_reply(model, false, request) {
            None => Err(unscripted(model)),
            Some(MockReply::Text(text)) => Ok(GenerateResponse {
                parts: vec![ContentPart::Visible(text)],
                grounding: None,
            }),
            Some(MockReply::Parts(parts)) => Ok(GenerateResponse {
                parts,
                grounding: None,
            }),
            Some(MockReply::Grounded { text, queries }) => Ok(GenerateResponse {
                parts: vec![ContentPart::Visible(text)],
                grounding: Some(GroundingMetadata {
                    web_search_queries: queries,
                }),
            }),
            Some(MockReply::Fail(err)) => Err(err),
            Some(MockReply::Frames(_)) => Err(UpstreamError::InvalidResponse(
                "frames scripted for a single-shot call".to_string(),
            )),
            Some(MockReply::Hang(_)) => {
                futures::future::pending::<Result<GenerateResponse, UpstreamError>>().await
            }
        }
    }

    async fn stream(
        &self,
        model: &str,
        request: &RequestSpec,
    ) -> Result<FrameStream, UpstreamError> {
        let frames: Vec<Result<StreamFrame, UpstreamError>> =
            match self.next_reply(model, true, request) {
                None => return Err(unscripted(model)),
                Some(MockReply::Fail(err)) => return Err(err),
                Some(MockReply::Text(text)) | Some(MockReply::Grounded { text, .. }) => {
                    vec![Ok(Self::text_frame(&text)), Ok(StreamFrame::End)]
                }
                Some(MockReply::Parts(parts)) => parts
                    .iter()
                    .map(|p| Ok(part_frame(p)))
                    .chain(std::iter::once(Ok(StreamFrame::End)))
                    .collect(),
                Some(MockReply::Frames(frames)) => frames,
                Some(MockReply::Hang(frames)) => {
                    let head = futures::stream::iter(frames.into_iter().map(Ok));
                    return Ok(head.chain(futures::stream::pending()).boxed());
                }
            };
        Ok(futures::stream::iter(frames).boxed())
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>, UpstreamError> {
        *self.list_calls.lock() += 1;
        match self.models.lock().clone() {
            Some(result) => result,
            None => Err(UpstreamError::Upstream {
                status: 501,
                message: "listing not scripted".to_string(),
            }),
        }
    }

    fn transport_name(&self) -> &str {
        "mock"
    }
}
