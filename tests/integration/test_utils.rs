//! Shared test utilities for integration tests
//!
//! Provides environment isolation for configuration tests and a scripted
//! client builder for dispatch and streaming tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tether::backoff::BackoffPolicy;
use tether::catalog::{CatalogSettings, ModelCatalog, ModelDescriptor};
use tether::dispatch::DispatchPolicy;
use tether::provider::MockTransport;
use tether::types::CapabilityClass;
use tether::GenerationClient;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Variables a test may set; restored afterwards
const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "TETHER_ENV",
    "TETHER__API__BASE_URL",
    "TETHER__RETRY__MAX_ATTEMPTS_PER_MODEL",
    "TETHER__DEFAULTS__TEMPERATURE",
    "TETHER__LOGGING__LEVEL",
];

struct EnvState(Vec<(&'static str, Option<String>)>);

impl EnvState {
    fn capture() -> Self {
        Self(
            ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        )
    }

    fn restore(self) {
        for (name, value) in self.0 {
            match value {
                Some(orig) => std::env::set_var(name, orig),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir` and every
/// tether override variable cleared. The environment is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    for name in ISOLATED_VARS {
        std::env::remove_var(name);
    }
    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("config");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    env_state.restore();
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

pub const FAST: &str = "gemini-2.5-flash";
pub const QUALITY: &str = "gemini-2.5-pro";

/// Catalog with discovery off and the two default fallback models
pub fn fixed_catalog() -> Arc<ModelCatalog> {
    Arc::new(ModelCatalog::new(CatalogSettings {
        fallback: vec![
            ModelDescriptor::new(FAST, CapabilityClass::Fast),
            ModelDescriptor::new(QUALITY, CapabilityClass::Quality),
        ],
        discovery: false,
        ..CatalogSettings::default()
    }))
}

/// Two attempts per model, 5s default wait capped at 15s
pub fn test_policy() -> DispatchPolicy {
    DispatchPolicy {
        max_attempts_per_model: 2,
        backoff: BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(15)),
    }
}

pub fn scripted_client(mock: Arc<MockTransport>) -> GenerationClient {
    GenerationClient::new(mock, fixed_catalog(), test_policy())
}
