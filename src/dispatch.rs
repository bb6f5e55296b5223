//! Model-fallback dispatcher.
//!
//! Turns an ordered list of candidate models into a single reliable call.
//! The state machine is a pure function, [`transition`], so the retry and
//! fallback rules are testable without any network; [`Dispatcher::run`]
//! drives it against a caller-supplied attempt function.
//!
//! Rules per attempt outcome:
//! - success ends the chain;
//! - rate limited retries the same model after a backoff wait while the
//!   per-model attempt budget lasts, then moves to the next model;
//! - model unavailable moves to the next model immediately;
//! - anything else aborts the whole chain.

use crate::backoff::BackoffPolicy;
use crate::catalog::ModelDescriptor;
use crate::error::{FailureClass, GenerationError, UpstreamError};
use crate::types::{AttemptOutcomeKind, AttemptRecord};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry budget and backoff used by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Attempts allowed on one model before moving on (>= 1)
    pub max_attempts_per_model: u32,
    pub backoff: BackoffPolicy,
}

impl DispatchPolicy {
    pub const DEFAULT_MAX_ATTEMPTS_PER_MODEL: u32 = 2;
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_model: Self::DEFAULT_MAX_ATTEMPTS_PER_MODEL,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    /// Issue attempt `attempt` (0-indexed) against candidate `index`
    TryModel { index: usize, attempt: u32 },
    /// Wait `wait`, then issue attempt `attempt` against the same candidate
    RetrySameModel {
        index: usize,
        attempt: u32,
        wait: Duration,
    },
    /// Candidate `index` is done; move past it
    NextModel { index: usize },
    Success { index: usize },
    Exhausted,
    /// Candidate `index` produced a fatal error
    Aborted { index: usize },
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Success { .. } | DispatchState::Exhausted | DispatchState::Aborted { .. }
        )
    }
}

/// Classified result of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited { suggested: Option<Duration> },
    ModelUnavailable,
    Fatal,
}

impl AttemptOutcome {
    pub fn from_error(err: &UpstreamError) -> Self {
        match err.class() {
            FailureClass::RateLimited => AttemptOutcome::RateLimited {
                suggested: err.retry_after(),
            },
            FailureClass::Unavailable => AttemptOutcome::ModelUnavailable,
            FailureClass::Fatal => AttemptOutcome::Fatal,
        }
    }

    pub fn kind(&self) -> AttemptOutcomeKind {
        match self {
            AttemptOutcome::Success => AttemptOutcomeKind::Success,
            AttemptOutcome::RateLimited { .. } => AttemptOutcomeKind::RateLimited,
            AttemptOutcome::ModelUnavailable => AttemptOutcomeKind::NotFound,
            AttemptOutcome::Fatal => AttemptOutcomeKind::OtherError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Start,
    Outcome(AttemptOutcome),
    /// A wait or model switch has completed
    Resume,
}

/// Pure transition function of the dispatch state machine.
/// Events that do not apply to `state` leave it unchanged.
pub fn transition(
    state: &DispatchState,
    event: DispatchEvent,
    model_count: usize,
    policy: &DispatchPolicy,
) -> DispatchState {
    match (state, event) {
        (DispatchState::Idle, DispatchEvent::Start) => {
            if model_count == 0 {
                DispatchState::Exhausted
            } else {
                DispatchState::TryModel {
                    index: 0,
                    attempt: 0,
                }
            }
        }
        (DispatchState::TryModel { index, attempt }, DispatchEvent::Outcome(outcome)) => {
            let index = *index;
            match outcome {
                AttemptOutcome::Success => DispatchState::Success { index },
                AttemptOutcome::RateLimited { suggested } => {
                    let attempts_made = attempt + 1;
                    if attempts_made < policy.max_attempts_per_model.max(1) {
                        DispatchState::RetrySameModel {
                            index,
                            attempt: attempts_made,
                            wait: policy.backoff.delay(*attempt, suggested),
                        }
                    } else {
                        DispatchState::NextModel { index }
                    }
                }
                AttemptOutcome::ModelUnavailable => DispatchState::NextModel { index },
                AttemptOutcome::Fatal => DispatchState::Aborted { index },
            }
        }
        (DispatchState::RetrySameModel { index, attempt, .. }, DispatchEvent::Resume) => {
            DispatchState::TryModel {
                index: *index,
                attempt: *attempt,
            }
        }
        (DispatchState::NextModel { index }, DispatchEvent::Resume) => {
            if index + 1 < model_count {
                DispatchState::TryModel {
                    index: index + 1,
                    attempt: 0,
                }
            } else {
                DispatchState::Exhausted
            }
        }
        (state, _) => state.clone(),
    }
}

/// Why an attempt produced no value
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    Upstream(UpstreamError),
    Cancelled,
}

impl From<UpstreamError> for AttemptError {
    fn from(err: UpstreamError) -> Self {
        AttemptError::Upstream(err)
    }
}

/// Value produced by the winning attempt
#[derive(Debug, Clone)]
pub struct Dispatched<T> {
    pub value: T,
    pub model: String,
}

/// Result of a dispatch run plus its attempt history
#[derive(Debug)]
pub struct DispatchReport<T> {
    pub outcome: Result<Dispatched<T>, GenerationError>,
    pub attempts: Vec<AttemptRecord>,
}

impl<T> DispatchReport<T> {
    pub fn into_result(self) -> Result<Dispatched<T>, GenerationError> {
        self.outcome
    }

    /// Models that reported themselves unavailable during the run
    pub fn unavailable_models(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|r| r.outcome == AttemptOutcomeKind::NotFound)
            .map(|r| r.model.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Run the dispatch chain over `models`, calling `attempt_fn(model, attempt)`
    /// for each try. Cancellation is checked at every await point; once it
    /// fires no further attempt is issued or recorded.
    pub async fn run<'m, T, F, Fut>(
        &self,
        models: &'m [ModelDescriptor],
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> DispatchReport<T>
    where
        F: FnMut(&'m ModelDescriptor, u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut models_tried: Vec<String> = Vec::new();
        let mut last_error: Option<UpstreamError> = None;
        let mut state = transition(
            &DispatchState::Idle,
            DispatchEvent::Start,
            models.len(),
            &self.policy,
        );

        let outcome = loop {
            match state {
                DispatchState::TryModel { index, attempt } => {
                    if cancel.is_cancelled() {
                        break Err(GenerationError::Cancelled);
                    }
                    let model = &models[index];
                    if models_tried.last() != Some(&model.id) {
                        models_tried.push(model.id.clone());
                    }
                    debug!(model = %model.id, attempt, "Dispatching attempt");

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(AttemptError::Cancelled),
                        result = attempt_fn(model, attempt) => result,
                    };

                    match result {
                        Ok(value) => {
                            attempts.push(AttemptRecord {
                                model: model.id.clone(),
                                attempt,
                                outcome: AttemptOutcomeKind::Success,
                                wait_before_retry: None,
                                error: None,
                            });
                            info!(model = %model.id, attempt, "Generation attempt succeeded");
                            break Ok(Dispatched {
                                value,
                                model: model.id.clone(),
                            });
                        }
                        Err(AttemptError::Cancelled) => break Err(GenerationError::Cancelled),
                        Err(AttemptError::Upstream(err)) => {
                            let attempt_outcome = AttemptOutcome::from_error(&err);
                            let next = transition(
                                &state,
                                DispatchEvent::Outcome(attempt_outcome),
                                models.len(),
                                &self.policy,
                            );
                            let wait_before_retry = match &next {
                                DispatchState::RetrySameModel { wait, .. } => Some(*wait),
                                _ => None,
                            };
                            warn!(
                                model = %model.id,
                                attempt,
                                outcome = %attempt_outcome.kind(),
                                wait_ms = wait_before_retry.map(|w| w.as_millis() as u64),
                                error = %err,
                                "Generation attempt failed"
                            );
                            attempts.push(AttemptRecord {
                                model: model.id.clone(),
                                attempt,
                                outcome: attempt_outcome.kind(),
                                wait_before_retry,
                                error: Some(err.to_string()),
                            });
                            last_error = Some(err);
                            state = next;
                        }
                    }
                }
                DispatchState::RetrySameModel { wait, .. } => {
                    let cancelled = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(wait) => false,
                    };
                    if cancelled {
                        break Err(GenerationError::Cancelled);
                    }
                    state = transition(&state, DispatchEvent::Resume, models.len(), &self.policy);
                }
                DispatchState::NextModel { .. } => {
                    state = transition(&state, DispatchEvent::Resume, models.len(), &self.policy);
                }
                DispatchState::Exhausted => {
                    break Err(GenerationError::Exhausted {
                        last_cause: last_error.take(),
                        models_tried: std::mem::take(&mut models_tried),
                    });
                }
                DispatchState::Aborted { .. } => {
                    let cause = last_error.take().unwrap_or_else(|| {
                        UpstreamError::Transport("attempt aborted without a cause".to_string())
                    });
                    break Err(GenerationError::Failed {
                        cause,
                        models_tried: std::mem::take(&mut models_tried),
                    });
                }
                DispatchState::Idle | DispatchState::Success { .. } => {
                    // Unreachable from Start; Success breaks out directly.
                    break Err(GenerationError::Exhausted {
                        last_cause: last_error.take(),
                        models_tried: std::mem::take(&mut models_tried),
                    });
                }
            }
        };

        if let Err(err) = &outcome {
            warn!(error = %err, attempts = attempts.len(), "Dispatch chain failed");
        }

        DispatchReport { outcome, attempts }
    }
}
