//! HTTP transport for the Gemini-style generation endpoint.

use crate::error::UpstreamError;
use crate::provider::wire::{WireErrorBody, WireModelList, WireRequest, WireResponse};
use crate::provider::{
    FrameStream, GenerateResponse, GenerationTransport, RemoteModel, StreamFrame,
};
use crate::stream::sse::SseDecoder;
use crate::types::RequestSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_LIST_PAGES: usize = 10;

static DELAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*s?\s*$").expect("valid delay pattern"));

/// Parse a server-suggested delay: `"12s"`, `"1.5s"` or a bare seconds value.
pub fn parse_delay(raw: &str) -> Option<Duration> {
    let caps = DELAY_PATTERN.captures(raw)?;
    let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
    // Out-of-range values are treated as absent rather than clamped.
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse a `Retry-After` header: delay seconds or an HTTP date. A date in
/// the past means retry now.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    parse_delay(raw).or_else(|| {
        let at = DateTime::parse_from_rfc2822(raw.trim()).ok()?;
        let wait = at.with_timezone(&Utc) - Utc::now();
        Some(wait.to_std().unwrap_or(Duration::ZERO))
    })
}

/// Map a non-success status and its body to the dispatcher's failure classes.
pub fn classify_failure(status: u16, retry_after_header: Option<&str>, body: &str) -> UpstreamError {
    let detail = serde_json::from_str::<WireErrorBody>(body)
        .ok()
        .and_then(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        429 => {
            let retry_after = retry_after_header
                .and_then(parse_retry_after)
                .or_else(|| detail.as_ref().and_then(|d| d.retry_delay()).and_then(parse_delay));
            UpstreamError::RateLimited {
                message,
                retry_after,
            }
        }
        404 | 410 => UpstreamError::ModelUnavailable(message),
        _ => UpstreamError::Upstream { status, message },
    }
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    /// Applied to single-shot requests only
    pub request_timeout: Duration,
    /// Longest wait for the next chunk of a streamed body
    pub stream_idle_timeout: Duration,
}

impl GeminiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Gemini-style generation endpoint over reqwest
pub struct GeminiTransport {
    client: Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl GeminiTransport {
    pub fn new(settings: GeminiSettings) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            request_timeout: settings.request_timeout,
            stream_idle_timeout: settings.stream_idle_timeout,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    // No overall deadline here; callers add one where the body is bounded.
    fn post(&self, url: &str, request: &RequestSpec) -> RequestBuilder {
        self.client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&WireRequest::from_spec(request))
    }
}

// Turn a non-success response into a classified error, consuming its body
async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status.as_u16(), retry_after.as_deref(), &body))
}

#[async_trait]
impl GenerationTransport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        request: &RequestSpec,
    ) -> Result<GenerateResponse, UpstreamError> {
        let url = self.model_url(model, "generateContent");
        let pending = self.post(&url, request).timeout(self.request_timeout);
        let response = ensure_success(pending.send().await?).await?;
        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        let (parts, grounding) = body.into_parts();
        Ok(GenerateResponse { parts, grounding })
    }

    async fn stream(
        &self,
        model: &str,
        request: &RequestSpec,
    ) -> Result<FrameStream, UpstreamError> {
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        let sent = tokio::time::timeout(self.request_timeout, self.post(&url, request).send())
            .await
            .map_err(|_| UpstreamError::Transport("Request timeout: no stream response".to_string()))?;
        let response = ensure_success(sent?).await?;
        Ok(decode_sse(response, self.stream_idle_timeout))
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>, UpstreamError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut builder = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&[("pageSize", "1000")])
                .timeout(self.request_timeout);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }
            let response = ensure_success(builder.send().await?).await?;
            let page: WireModelList = response.json().await.map_err(|e| {
                UpstreamError::InvalidResponse(format!("Failed to parse models response: {}", e))
            })?;
            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = models.len(), "Listed remote models");
        Ok(models)
    }

    fn transport_name(&self) -> &str {
        "gemini"
    }
}

type ByteStream = futures::stream::BoxStream<'static, Result<Vec<u8>, UpstreamError>>;

struct SseState {
    bytes: ByteStream,
    idle_timeout: Duration,
    decoder: SseDecoder,
    pending: VecDeque<StreamFrame>,
    finished: bool,
}

// Adapt the response body into decoded frames. Dropping the returned stream
// drops the body and releases the connection.
fn decode_sse(response: Response, idle_timeout: Duration) -> FrameStream {
    let bytes = response
        .bytes_stream()
        .map(|chunk| chunk.map(|b| b.to_vec()).map_err(UpstreamError::from))
        .boxed();
    decode_frames(bytes, idle_timeout)
}

// A read silent for longer than `idle_timeout` ends the stream with a
// transport failure.
fn decode_frames(bytes: ByteStream, idle_timeout: Duration) -> FrameStream {
    let state = SseState {
        bytes,
        idle_timeout,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            let next = match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    state.finished = true;
                    let err = UpstreamError::Transport(format!(
                        "Stream idle for {}s",
                        state.idle_timeout.as_secs_f64()
                    ));
                    return Some((Err(err), state));
                }
            };
            match next {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.push(&chunk)),
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
