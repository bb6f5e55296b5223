//! Model catalog: the ordered candidate list behind every dispatch chain.
//!
//! Holds a fixed fallback list and, once discovery has succeeded, the models
//! the endpoint reported. `ordered(purpose)` always returns a non-empty,
//! deterministic sequence: preferred capability class first, newest version
//! first within a class, discovery order on ties.

use crate::provider::{GenerationTransport, RemoteModel};
use crate::types::{CapabilityClass, Purpose};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub mod version;

/// Generation method a usable model must support
pub const GENERATE_METHOD: &str = "generateContent";

/// One backend model variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub class: CapabilityClass,
    #[serde(default = "default_true")]
    pub still_valid: bool,
}

fn default_true() -> bool {
    true
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, class: CapabilityClass) -> Self {
        Self {
            id: id.into(),
            class,
            still_valid: true,
        }
    }
}

/// Built-in candidates used until discovery succeeds
pub fn default_fallback_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("gemini-2.5-flash", CapabilityClass::Fast),
        ModelDescriptor::new("gemini-2.5-pro", CapabilityClass::Quality),
    ]
}

/// Identifier fragments that disqualify a discovered model
pub fn default_excluded_tokens() -> Vec<String> {
    ["preview", "tts", "audio", "embedding", "lite"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Catalog settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub fallback: Vec<ModelDescriptor>,
    pub discovery: bool,
    /// Family token every discovered id must contain
    pub family: String,
    pub excluded_tokens: Vec<String>,
    /// Keep at most this many discovered models per class
    pub max_per_class: Option<usize>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            fallback: default_fallback_models(),
            discovery: true,
            family: "gemini".to_string(),
            excluded_tokens: default_excluded_tokens(),
            max_per_class: Some(1),
        }
    }
}

/// Result of a discovery refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Discovered list replaced with this many descriptors
    Updated(usize),
    /// Another refresh was already running
    InFlight,
    /// Discovery is turned off
    Disabled,
    /// Discovery failed or found nothing usable; previous list kept
    Kept { reason: String },
}

// Clears the in-flight flag even if the refresh future is dropped midway
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ModelCatalog {
    settings: CatalogSettings,
    discovered: RwLock<Vec<ModelDescriptor>>,
    invalidated: RwLock<HashSet<String>>,
    refreshing: AtomicBool,
}

impl ModelCatalog {
    pub fn new(mut settings: CatalogSettings) -> Self {
        if settings.fallback.is_empty() {
            settings.fallback = default_fallback_models();
        }
        Self {
            settings,
            discovered: RwLock::new(Vec::new()),
            invalidated: RwLock::new(HashSet::new()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Whether discovery has ever produced a usable list
    pub fn has_discovered(&self) -> bool {
        !self.discovered.read().is_empty()
    }

    /// Candidates for `purpose`, preferred class first. Never empty.
    pub fn ordered(&self, purpose: Purpose) -> Vec<ModelDescriptor> {
        let invalidated = self.invalidated.read();
        let discovered = self.discovered.read();

        let usable = |list: &[ModelDescriptor]| -> Vec<ModelDescriptor> {
            list.iter()
                .filter(|d| !invalidated.contains(&d.id))
                .cloned()
                .collect()
        };

        let mut candidates = usable(&discovered);
        if candidates.is_empty() {
            candidates = usable(&self.settings.fallback);
        }
        if candidates.is_empty() {
            // Every known model was invalidated; hand back the fixed list
            // flagged as stale rather than nothing.
            candidates = self
                .settings
                .fallback
                .iter()
                .cloned()
                .map(|mut d| {
                    d.still_valid = false;
                    d
                })
                .collect();
        }

        order_for_purpose(candidates, purpose)
    }

    /// Mark a model as no longer valid; later `ordered` calls skip it.
    pub fn invalidate(&self, model_id: &str) {
        if self.invalidated.write().insert(model_id.to_string()) {
            info!(model = %model_id, "Model marked unavailable");
        }
    }

    /// Replace the discovered list from the endpoint's listing.
    /// Failures are logged and swallowed; concurrent refreshes are skipped.
    pub async fn refresh(&self, transport: &dyn GenerationTransport) -> RefreshOutcome {
        if !self.settings.discovery {
            return RefreshOutcome::Disabled;
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Model discovery already in flight");
            return RefreshOutcome::InFlight;
        }
        let _guard = RefreshGuard(&self.refreshing);

        let remote = match transport.list_models().await {
            Ok(models) => models,
            Err(err) => {
                warn!(error = %err, "Model discovery failed, keeping current list");
                return RefreshOutcome::Kept {
                    reason: err.to_string(),
                };
            }
        };

        let descriptors = self.select_discovered(&remote);
        if descriptors.is_empty() {
            warn!(
                listed = remote.len(),
                "Model discovery found no usable models, keeping current list"
            );
            return RefreshOutcome::Kept {
                reason: "no usable models".to_string(),
            };
        }

        let ids: Vec<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();
        info!(models = ?ids, "Model discovery updated candidates");
        let count = descriptors.len();
        *self.discovered.write() = descriptors;
        self.invalidated.write().clear();
        RefreshOutcome::Updated(count)
    }

    /// Filter and classify a model listing, newest first within each class.
    pub fn select_discovered(&self, remote: &[RemoteModel]) -> Vec<ModelDescriptor> {
        let mut descriptors: Vec<ModelDescriptor> = remote
            .iter()
            .filter(|m| m.supports(GENERATE_METHOD))
            .map(|m| m.id().to_string())
            .filter(|id| id.contains(&self.settings.family))
            .filter(|id| !self.settings.excluded_tokens.iter().any(|t| id.contains(t.as_str())))
            .filter_map(|id| classify(&id).map(|class| ModelDescriptor::new(id, class)))
            .collect();

        descriptors.sort_by(|a, b| version::compare_newest_first(&a.id, &b.id));

        let mut seen = HashSet::new();
        descriptors.retain(|d| seen.insert(d.id.clone()));

        if let Some(limit) = self.settings.max_per_class {
            let mut fast = 0usize;
            let mut quality = 0usize;
            descriptors.retain(|d| {
                let count = match d.class {
                    CapabilityClass::Fast => &mut fast,
                    CapabilityClass::Quality => &mut quality,
                };
                *count += 1;
                *count <= limit
            });
        }
        descriptors
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(CatalogSettings::default())
    }
}

/// Capability class from a model identifier
pub fn classify(model_id: &str) -> Option<CapabilityClass> {
    if model_id.contains("pro") {
        Some(CapabilityClass::Quality)
    } else if model_id.contains("flash") {
        Some(CapabilityClass::Fast)
    } else {
        None
    }
}

/// Stable ordering: preferred class first, newer versions first, input order on ties.
pub fn order_for_purpose(
    mut candidates: Vec<ModelDescriptor>,
    purpose: Purpose,
) -> Vec<ModelDescriptor> {
    let preferred = purpose.preferred_class();
    candidates.sort_by(|a, b| {
        (a.class != preferred)
            .cmp(&(b.class != preferred))
            .then_with(|| version::compare_newest_first(&a.id, &b.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::provider::MockTransport;

    fn ids(list: &[ModelDescriptor]) -> Vec<&str> {
        list.iter().map(|d| d.id.as_str()).collect()
    }

    fn listing() -> Vec<RemoteModel> {
        vec![
            RemoteModel::new("models/gemini-1.5-flash", &["generateContent"]),
            RemoteModel::new("models/gemini-2.5-flash", &["generateContent"]),
            RemoteModel::new("models/gemini-2.5-flash-lite", &["generateContent"]),
            RemoteModel::new("models/gemini-2.5-pro", &["generateContent"]),
            RemoteModel::new("models/gemini-3.0-pro-preview", &["generateContent"]),
            RemoteModel::new("models/text-embedding-004", &["embedContent"]),
            RemoteModel::new("models/gemini-2.0-pro", &["countTokens"]),
        ]
    }

    #[test]
    fn fallback_order_follows_purpose() {
        let catalog = ModelCatalog::default();
        assert_eq!(
            ids(&catalog.ordered(Purpose::Quality)),
            vec!["gemini-2.5-pro", "gemini-2.5-flash"]
        );
        assert_eq!(
            ids(&catalog.ordered(Purpose::Fast)),
            vec!["gemini-2.5-flash", "gemini-2.5-pro"]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let candidates = vec![
            ModelDescriptor::new("alpha-pro", CapabilityClass::Quality),
            ModelDescriptor::new("beta-pro", CapabilityClass::Quality),
            ModelDescriptor::new("gamma-flash", CapabilityClass::Fast),
        ];
        let ordered = order_for_purpose(candidates, Purpose::Quality);
        assert_eq!(ids(&ordered), vec!["alpha-pro", "beta-pro", "gamma-flash"]);
    }

    #[test]
    fn discovery_filters_and_keeps_best_per_class() {
        let catalog = ModelCatalog::default();
        let selected = catalog.select_discovered(&listing());
        assert_eq!(ids(&selected), vec!["gemini-2.5-flash", "gemini-2.5-pro"]);
    }

    #[test]
    fn unlimited_discovery_orders_by_version() {
        let catalog = ModelCatalog::new(CatalogSettings {
            max_per_class: None,
            ..CatalogSettings::default()
        });
        let selected = catalog.select_discovered(&listing());
        assert_eq!(
            ids(&selected),
            vec!["gemini-2.5-flash", "gemini-2.5-pro", "gemini-1.5-flash"]
        );
    }

    #[tokio::test]
    async fn refresh_replaces_list_and_failure_keeps_it() {
        let catalog = ModelCatalog::new(CatalogSettings {
            max_per_class: None,
            ..CatalogSettings::default()
        });
        let good = MockTransport::new().with_models(vec![
            RemoteModel::new("models/gemini-3.1-pro", &["generateContent"]),
            RemoteModel::new("models/gemini-3.1-flash", &["generateContent"]),
        ]);
        assert_eq!(catalog.refresh(&good).await, RefreshOutcome::Updated(2));
        assert!(catalog.has_discovered());
        assert_eq!(
            ids(&catalog.ordered(Purpose::Quality)),
            vec!["gemini-3.1-pro", "gemini-3.1-flash"]
        );

        let broken = MockTransport::new()
            .with_listing_failure(UpstreamError::Transport("offline".to_string()));
        assert!(matches!(
            catalog.refresh(&broken).await,
            RefreshOutcome::Kept { .. }
        ));
        assert_eq!(
            ids(&catalog.ordered(Purpose::Fast)),
            vec!["gemini-3.1-flash", "gemini-3.1-pro"]
        );
    }

    #[tokio::test]
    async fn empty_discovery_keeps_fallback() {
        let catalog = ModelCatalog::default();
        let empty = MockTransport::new().with_models(vec![RemoteModel::new(
            "models/text-embedding-004",
            &["embedContent"],
        )]);
        assert!(matches!(
            catalog.refresh(&empty).await,
            RefreshOutcome::Kept { .. }
        ));
        assert!(!catalog.has_discovered());
        assert_eq!(catalog.ordered(Purpose::Fast).len(), 2);
    }

    #[tokio::test]
    async fn disabled_discovery_never_calls_transport() {
        let catalog = ModelCatalog::new(CatalogSettings {
            discovery: false,
            ..CatalogSettings::default()
        });
        let mock = MockTransport::new().with_models(listing());
        assert_eq!(catalog.refresh(&mock).await, RefreshOutcome::Disabled);
        assert_eq!(mock.list_calls(), 0);
    }

    #[test]
    fn concurrent_refresh_is_skipped() {
        let catalog = ModelCatalog::default();
        catalog.refreshing.store(true, Ordering::Release);
        let mock = MockTransport::new().with_models(listing());
        let outcome = futures::executor::block_on(catalog.refresh(&mock));
        assert_eq!(outcome, RefreshOutcome::InFlight);
        assert_eq!(mock.list_calls(), 0);
    }

    #[test]
    fn invalidated_models_are_skipped_but_list_never_empty() {
        let catalog = ModelCatalog::default();
        catalog.invalidate("gemini-2.5-pro");
        assert_eq!(ids(&catalog.ordered(Purpose::Quality)), vec!["gemini-2.5-flash"]);

        catalog.invalidate("gemini-2.5-flash");
        let ordered = catalog.ordered(Purpose::Quality);
        assert_eq!(ids(&ordered), vec!["gemini-2.5-pro", "gemini-2.5-flash"]);
        assert!(ordered.iter().all(|d| !d.still_valid));
    }
}
