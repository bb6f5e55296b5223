//! Backoff policy for rate-limited retries.
//!
//! The wait is either the server's suggestion (capped) or a fixed default.
//! There is no attempt-based growth: the retry budget lives in the dispatcher,
//! so the worst-case latency of a call stays bounded.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub default_wait: Duration,
    pub max_wait: Duration,
}

impl BackoffPolicy {
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);
    pub const MAX_WAIT: Duration = Duration::from_secs(15);

    pub fn new(default_wait: Duration, max_wait: Duration) -> Self {
        Self {
            default_wait,
            max_wait,
        }
    }

    /// Wait before retry number `attempt` (0-indexed) on the same model.
    pub fn delay(&self, _attempt: u32, suggested: Option<Duration>) -> Duration {
        match suggested {
            Some(wait) => wait.min(self.max_wait),
            None => self.default_wait.min(self.max_wait),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WAIT, Self::MAX_WAIT)
    }
}
