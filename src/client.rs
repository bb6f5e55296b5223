//! Generation client facade.
//!
//! Composes the model catalog, the dispatcher and the stream consumer into
//! the caller-facing entry points. Every call gets its own candidate list,
//! attempt history and accumulator; the catalog is the only shared state.

use crate::catalog::{ModelCatalog, ModelDescriptor, RefreshOutcome};
use crate::config::{GenerationDefaults, TetherConfig};
use crate::dispatch::{AttemptError, DispatchPolicy, DispatchReport, Dispatcher};
use crate::error::{GenerationError, ParseError};
use crate::provider::{GeminiTransport, GenerateResponse, GenerationTransport};
use crate::repair::{OutputRepairParser, ParsedRecord};
use crate::stream::{self, StreamAccumulator, StreamInterrupted};
use crate::types::{join_visible, GenerationResult, GroundingMetadata, Purpose, RequestSpec};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct GenerationClient {
    transport: Arc<dyn GenerationTransport>,
    catalog: Arc<ModelCatalog>,
    dispatcher: Dispatcher,
    parser: OutputRepairParser,
    defaults: GenerationDefaults,
}

impl GenerationClient {
    pub fn new(
        transport: Arc<dyn GenerationTransport>,
        catalog: Arc<ModelCatalog>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            transport,
            catalog,
            dispatcher: Dispatcher::new(policy),
            parser: OutputRepairParser::default(),
            defaults: GenerationDefaults::default(),
        }
    }

    /// Client for the configured HTTP endpoint. Fails with `NotConfigured`
    /// when no credential can be resolved.
    pub fn from_config(config: &TetherConfig) -> Result<Self, GenerationError> {
        let api_key = config.api.resolve_api_key().ok_or_else(|| {
            GenerationError::NotConfigured(format!(
                "no API key: set api.api_key or the {} environment variable",
                config.api.api_key_env
            ))
        })?;
        let transport = GeminiTransport::new(config.api.gemini_settings(api_key))
            .map_err(|e| GenerationError::ConfigError(e.to_string()))?;

        Ok(Self::new(
            Arc::new(transport),
            Arc::new(ModelCatalog::new(config.catalog.settings())),
            config.retry.policy(),
        )
        .with_defaults(config.defaults.clone()))
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_parser(mut self, parser: OutputRepairParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn transport_name(&self) -> &str {
        self.transport.transport_name()
    }

    /// Request for `prompt` carrying the configured generation defaults
    pub fn request(&self, prompt: impl Into<String>) -> RequestSpec {
        RequestSpec::new(prompt).with_params(self.defaults.params())
    }

    /// Run model discovery once; later calls are no-ops once it has succeeded.
    pub async fn init(&self) -> RefreshOutcome {
        if self.catalog.has_discovered() {
            return RefreshOutcome::Kept {
                reason: "already discovered".to_string(),
            };
        }
        self.refresh_models().await
    }

    /// Re-run model discovery.
    pub async fn refresh_models(&self) -> RefreshOutcome {
        self.catalog.refresh(self.transport.as_ref()).await
    }

    pub fn ordered_models(&self, purpose: Purpose) -> Vec<ModelDescriptor> {
        self.catalog.ordered(purpose)
    }

    /// Single-shot generation; returns the visible text.
    pub async fn generate(&self, request: &RequestSpec) -> Result<String, GenerationError> {
        self.generate_detailed(request, &CancellationToken::new())
            .await
            .map(|result| result.text)
    }

    /// Single-shot generation with attempt history, cancellable through `cancel`.
    pub async fn generate_detailed(
        &self,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let models = self.catalog.ordered(request.purpose);
        debug!(
            purpose = ?request.purpose,
            candidates = models.len(),
            grounded = request.grounded,
            "Starting generation"
        );
        let transport = self.transport.as_ref();

        let report = self
            .dispatcher
            .run(&models, cancel, move |model, _attempt| async move {
                transport
                    .generate(&model.id, request)
                    .await
                    .map_err(AttemptError::from)
            })
            .await;

        self.finish(report, |response: GenerateResponse| {
            (join_visible(&response.parts), Vec::new(), response.grounding)
        })
    }

    /// Streamed generation. `on_chunk` receives the accumulated text after
    /// every chunk; a retried or fallback attempt starts again from empty.
    pub async fn generate_streaming<F>(
        &self,
        request: &RequestSpec,
        on_chunk: F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        self.generate_streaming_detailed(request, on_chunk, &CancellationToken::new())
            .await
            .map(|result| result.text)
    }

    /// Streamed generation with chunk list and attempt history. After `cancel`
    /// fires, `on_chunk` is not called again.
    pub async fn generate_streaming_detailed<F>(
        &self,
        request: &RequestSpec,
        on_chunk: F,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        let models = self.catalog.ordered(request.purpose);
        debug!(
            purpose = ?request.purpose,
            candidates = models.len(),
            "Starting streamed generation"
        );
        let transport = self.transport.as_ref();
        let sink = tokio::sync::Mutex::new(on_chunk);
        let sink = &sink;

        let report = self
            .dispatcher
            .run(&models, cancel, move |model, _attempt| async move {
                let frames = match transport.stream(&model.id, request).await {
                    Ok(frames) => frames,
                    Err(err) => return Err(AttemptError::Upstream(err)),
                };
                let mut sink = sink.lock().await;
                stream::consume(frames, &mut *sink, cancel)
                    .await
                    .map_err(|interrupted| match interrupted {
                        StreamInterrupted::Upstream(err) => AttemptError::Upstream(err),
                        StreamInterrupted::Cancelled => AttemptError::Cancelled,
                    })
            })
            .await;

        self.finish(report, |acc: StreamAccumulator| {
            let (text, chunks) = acc.into_parts();
            (text, chunks, None)
        })
    }

    /// Search-grounded generation. Discovery runs first so the newest
    /// quality model is tried; the output cap is raised for cited answers.
    pub async fn generate_grounded(
        &self,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        self.refresh_models().await;

        let mut grounded = request.clone();
        grounded.grounded = true;
        grounded.purpose = Purpose::Quality;
        grounded.params.max_output_tokens = grounded
            .params
            .max_output_tokens
            .max(self.defaults.grounded_max_output_tokens);

        self.generate_detailed(&grounded, cancel).await
    }

    /// Recover structured records from generated text.
    pub fn parse_structured_output(&self, text: &str) -> Result<Vec<ParsedRecord>, ParseError> {
        self.parser.parse(text)
    }

    /// Recover structured records and deserialize each into `T`.
    pub fn parse_structured_output_as<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<Vec<T>, ParseError> {
        self.parser.parse_as(text)
    }

    fn finish<T>(
        &self,
        report: DispatchReport<T>,
        into_parts: impl FnOnce(T) -> (String, Vec<String>, Option<GroundingMetadata>),
    ) -> Result<GenerationResult, GenerationError> {
        for model in report.unavailable_models() {
            self.catalog.invalidate(model);
        }

        let DispatchReport { outcome, attempts } = report;
        let dispatched = outcome?;
        let (text, chunks, grounding) = into_parts(dispatched.value);
        info!(
            model = %dispatched.model,
            attempts = attempts.len(),
            chars = text.len(),
            "Generation completed"
        );
        Ok(GenerationResult {
            text,
            model: dispatched.model,
            chunks,
            attempts,
            grounding,
        })
    }
}
