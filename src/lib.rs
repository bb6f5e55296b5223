//! Tether: Resilient Text Generation
//!
//! A generation client that walks an ordered list of backend models, retries
//! rate-limited calls with backoff, falls back past unavailable models, streams
//! partial output, and recovers structured records from malformed model text.

pub mod backoff;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod provider;
pub mod repair;
pub mod stream;
pub mod types;

pub use catalog::{ModelCatalog, ModelDescriptor};
pub use client::GenerationClient;
pub use crate::config::{ConfigLoader, TetherConfig};
pub use error::{GenerationError, ParseError, UpstreamError};
pub use repair::{OutputRepairParser, ParsedRecord, RecoveryStrategy};
pub use types::{GenerationResult, Purpose, RequestSpec};
pub use tokio_util::sync::CancellationToken;
