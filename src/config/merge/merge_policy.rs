//! Merge rules: defaults, override order, conflict handling.
//!
//! Scalar defaults are registered on the builder so every later layer can
//! override a single key. List-valued settings (fallback models, excluded
//! tokens) come from the serde defaults and are replaced whole by any layer
//! that sets them.

use crate::backoff::BackoffPolicy;
use crate::dispatch::DispatchPolicy;
use crate::provider::gemini::DEFAULT_BASE_URL;
use crate::types::GenerationParams;
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("api.base_url", DEFAULT_BASE_URL)?
        .set_default("api.api_key_env", "GEMINI_API_KEY")?
        .set_default("api.connect_timeout_secs", 10)?
        .set_default("api.request_timeout_secs", 120)?
        .set_default("api.stream_idle_timeout_secs", 60)?
        .set_default("catalog.discovery", true)?
        .set_default("catalog.max_per_class", 1)?
        .set_default(
            "retry.max_attempts_per_model",
            DispatchPolicy::DEFAULT_MAX_ATTEMPTS_PER_MODEL,
        )?
        .set_default("retry.default_wait_secs", BackoffPolicy::DEFAULT_WAIT.as_secs())?
        .set_default("retry.max_wait_secs", BackoffPolicy::MAX_WAIT.as_secs())?
        .set_default(
            "defaults.temperature",
            f64::from(GenerationParams::DEFAULT_TEMPERATURE),
        )?
        .set_default(
            "defaults.max_output_tokens",
            GenerationParams::DEFAULT_MAX_OUTPUT_TOKENS,
        )?
        .set_default(
            "defaults.grounded_max_output_tokens",
            GenerationParams::GROUNDED_MAX_OUTPUT_TOKENS,
        )?
        .set_default("defaults.thinking_budget", 0)?
        .set_default("logging.level", "warn")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
