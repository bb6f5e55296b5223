//! Configuration System
//!
//! Layered configuration for the generation client: built-in defaults, a
//! global file, project files, an explicit file and `TETHER__SECTION__KEY`
//! environment overrides, merged with the `config` crate. The client never
//! reads ambient state; it receives a [`TetherConfig`] explicitly.

use crate::backoff::BackoffPolicy;
use crate::catalog::{self, CatalogSettings, ModelDescriptor};
use crate::dispatch::DispatchPolicy;
use crate::logging::LoggingConfig;
use crate::provider::gemini::{GeminiSettings, DEFAULT_BASE_URL};
use crate::types::{CapabilityClass, GenerationParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub defaults: GenerationDefaults,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Endpoint and credential settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Credential given inline; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Bounds each non-streaming request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Longest gap allowed between two reads of a streamed body
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Inline key if set, otherwise the value of `api_key_env`. Blank values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn gemini_settings(&self, api_key: String) -> GeminiSettings {
        GeminiSettings {
            base_url: self.base_url.clone(),
            api_key,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            stream_idle_timeout: Duration::from_secs(self.stream_idle_timeout_secs),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("base_url must be an http(s) URL: {}", self.base_url));
        }
        if self.connect_timeout_secs == 0
            || self.request_timeout_secs == 0
            || self.stream_idle_timeout_secs == 0
        {
            return Err("timeouts must be greater than zero".to_string());
        }
        if self.api_key.is_none() && self.api_key_env.trim().is_empty() {
            return Err("either api_key or api_key_env must be set".to_string());
        }
        Ok(())
    }
}

/// One configured fallback model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackModel {
    pub id: String,
    pub class: CapabilityClass,
}

/// Candidate list and discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<FallbackModel>,

    #[serde(default = "default_true")]
    pub discovery: bool,

    #[serde(default = "catalog::default_excluded_tokens")]
    pub excluded_tokens: Vec<String>,

    /// Discovered models kept per capability class; 0 keeps all
    #[serde(default = "default_max_per_class")]
    pub max_per_class: usize,
}

fn default_fallback_models() -> Vec<FallbackModel> {
    catalog::default_fallback_models()
        .into_iter()
        .map(|d| FallbackModel {
            id: d.id,
            class: d.class,
        })
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_max_per_class() -> usize {
    1
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            fallback_models: default_fallback_models(),
            discovery: true,
            excluded_tokens: catalog::default_excluded_tokens(),
            max_per_class: default_max_per_class(),
        }
    }
}

impl CatalogConfig {
    pub fn settings(&self) -> CatalogSettings {
        CatalogSettings {
            fallback: self
                .fallback_models
                .iter()
                .map(|m| ModelDescriptor::new(m.id.clone(), m.class))
                .collect(),
            discovery: self.discovery,
            excluded_tokens: self.excluded_tokens.clone(),
            max_per_class: (self.max_per_class > 0).then_some(self.max_per_class),
            ..CatalogSettings::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.fallback_models.is_empty() {
            return Err("fallback_models cannot be empty".to_string());
        }
        if let Some(blank) = self.fallback_models.iter().position(|m| m.id.trim().is_empty()) {
            return Err(format!("fallback_models[{}] has an empty id", blank));
        }
        Ok(())
    }
}

/// Retry budget and waits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts_per_model")]
    pub max_attempts_per_model: u32,

    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,

    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_max_attempts_per_model() -> u32 {
    DispatchPolicy::DEFAULT_MAX_ATTEMPTS_PER_MODEL
}

fn default_wait_secs() -> u64 {
    BackoffPolicy::DEFAULT_WAIT.as_secs()
}

fn default_max_wait_secs() -> u64 {
    BackoffPolicy::MAX_WAIT.as_secs()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_model: default_max_attempts_per_model(),
            default_wait_secs: default_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_attempts_per_model: self.max_attempts_per_model,
            backoff: BackoffPolicy::new(
                Duration::from_secs(self.default_wait_secs),
                Duration::from_secs(self.max_wait_secs),
            ),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_attempts_per_model == 0 {
            return Err("max_attempts_per_model must be at least 1".to_string());
        }
        if self.default_wait_secs > self.max_wait_secs {
            return Err(format!(
                "default_wait_secs ({}) exceeds max_wait_secs ({})",
                self.default_wait_secs, self.max_wait_secs
            ));
        }
        Ok(())
    }
}

/// Generation parameters applied when a request does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_grounded_max_output_tokens")]
    pub grounded_max_output_tokens: u32,

    #[serde(default)]
    pub thinking_budget: u32,
}

fn default_temperature() -> f32 {
    GenerationParams::DEFAULT_TEMPERATURE
}

fn default_max_output_tokens() -> u32 {
    GenerationParams::DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_grounded_max_output_tokens() -> u32 {
    GenerationParams::GROUNDED_MAX_OUTPUT_TOKENS
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            grounded_max_output_tokens: default_grounded_max_output_tokens(),
            thinking_budget: 0,
        }
    }
}

impl GenerationDefaults {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            response_mime_type: None,
            thinking_budget: self.thinking_budget,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if self.max_output_tokens == 0 || self.grounded_max_output_tokens == 0 {
            return Err("output token caps must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Api(String),
    Catalog(String),
    Retry(String),
    Defaults(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Api(msg) => write!(f, "api: {}", msg),
            ValidationError::Catalog(msg) => write!(f, "catalog: {}", msg),
            ValidationError::Retry(msg) => write!(f, "retry: {}", msg),
            ValidationError::Defaults(msg) => write!(f, "defaults: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl TetherConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.api.validate() {
            errors.push(ValidationError::Api(e));
        }
        if let Err(e) = self.catalog.validate() {
            errors.push(ValidationError::Catalog(e));
        }
        if let Err(e) = self.retry.validate() {
            errors.push(ValidationError::Retry(e));
        }
        if let Err(e) = self.defaults.validate() {
            errors.push(ValidationError::Defaults(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective configuration as TOML, credential redacted
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let mut redacted = self.clone();
        if redacted.api.api_key.is_some() {
            redacted.api.api_key = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&redacted)
    }
}

/// Loads [`TetherConfig`] from every configured layer
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, project files and environment overrides.
    pub fn load(project_root: &Path) -> Result<TetherConfig, config::ConfigError> {
        Self::load_with(project_root, None)
    }

    /// As [`load`](Self::load), with `explicit` layered above the project files.
    pub fn load_with(
        project_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<TetherConfig, config::ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::project_file::add_to_builder(builder, project_root)?;
        let builder = match explicit {
            Some(path) => sources::explicit_file::add_to_builder(builder, path)?,
            None => builder,
        };
        let builder = sources::environment::add_to_builder(builder)?;
        builder.build()?.try_deserialize()
    }

    /// Defaults, the given file and environment overrides only.
    pub fn load_from_file(path: &Path) -> Result<TetherConfig, config::ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::explicit_file::add_to_builder(builder, path)?;
        let builder = sources::environment::add_to_builder(builder)?;
        builder.build()?.try_deserialize()
    }
}
