//! Task routing.
//!
//! Runs one task through its fallback chain: candidates from the registry,
//! one attempt per candidate in order, each attempt leasing a pool slot for
//! the duration of its backend call. The first attempt whose clamped
//! confidence is accepted wins; otherwise the attempts are folded into a
//! [`FailureSummary`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modelroute_core::{
    BackendId, Context, ModelCapabilities, ProgressEvent, Task, TaskId, TaskResult, TaskStatus,
    TaskType,
};

use crate::confidence::ConfidenceEvaluator;
use crate::context::{estimate_tokens, ContextAssembler};
use crate::metrics::RouterMetrics;
use crate::pool::{ModelResourcePool, PoolError};
use crate::registry::CapabilityRegistry;
use crate::render::PromptRenderer;
use crate::runtime::BackendError;
use crate::session::SessionStore;

/// A candidate attempt that passed evaluation.
#[derive(Debug, Clone)]
pub struct PassedAttempt {
    pub backend: BackendId,
    pub output: String,
    /// Clamped confidence.
    pub score: f64,
    pub metadata: HashMap<String, String>,
    /// Memory references used to build the prompt.
    pub retrieved: Vec<String>,
    pub prompt: String,
}

/// Why a candidate attempt did not pass.
#[derive(Debug, Clone, Error)]
pub enum AttemptFailure {
    #[error("load error: {0}")]
    Load(PoolError),

    #[error("backend error: {0}")]
    Backend(BackendError),

    #[error("low confidence, threshold {threshold:.2}")]
    LowConfidence { score: f64, threshold: f64 },

    #[error("input too large (~{estimated_tokens} tokens, max {max_tokens})")]
    InputTooLarge { estimated_tokens: u32, max_tokens: u32 },
}

impl AttemptFailure {
    /// Metric label for the outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Load(_) => "load_error",
            Self::Backend(_) => "backend_error",
            Self::LowConfidence { .. } => "low_confidence",
            Self::InputTooLarge { .. } => "input_too_large",
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Self::LowConfidence { score, .. } => Some(*score),
            _ => None,
        }
    }
}

/// One failed attempt in a fallback chain.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub backend: BackendId,
    pub failure: AttemptFailure,
}

/// Why a task did not complete.
#[derive(Debug, Clone)]
pub enum FailureSummary {
    /// Every candidate was tried and none passed.
    Exhausted {
        task_type: TaskType,
        attempts: Vec<AttemptRecord>,
    },
    /// The registry has no backend for the task type.
    NoBackend { task_type: TaskType },
    /// A dependency failed or was cancelled.
    DependencyFailed { dependency: TaskId },
    /// Dependencies did not complete within the pending timeout.
    DependencyTimeout { unmet: Vec<TaskId>, waited: Duration },
    /// The caller cancelled the task.
    Cancelled { attempts: Vec<AttemptRecord> },
}

impl FailureSummary {
    /// Terminal state this failure maps to.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Cancelled { .. } => TaskStatus::Cancelled,
            _ => TaskStatus::Failed,
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => attempts,
            _ => &[],
        }
    }
}

/// Every attempt reads `backend (score s): reason`, with `n/a` when the
/// backend never produced a score.
impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure.score() {
            Some(score) => write!(f, "{} (score {score:.2}): {}", self.backend, self.failure),
            None => write!(f, "{} (score n/a): {}", self.backend, self.failure),
        }
    }
}

fn write_attempts(f: &mut fmt::Formatter<'_>, attempts: &[AttemptRecord]) -> fmt::Result {
    for (i, attempt) in attempts.iter().enumerate() {
        let sep = if i == 0 { "" } else { "; " };
        write!(f, "{sep}{attempt}")?;
    }
    Ok(())
}

impl fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                task_type,
                attempts,
            } => {
                write!(f, "candidates exhausted for {task_type}: ")?;
                write_attempts(f, attempts)
            }
            Self::NoBackend { task_type } => {
                write!(f, "no backend supports task type {task_type}")
            }
            Self::DependencyFailed { dependency } => {
                write!(f, "dependency failed: task {dependency} did not complete")
            }
            Self::DependencyTimeout { unmet, waited } => {
                let unmet: Vec<&str> = unmet.iter().map(TaskId::as_str).collect();
                write!(
                    f,
                    "dependency wait timed out after {}s: still waiting on {}",
                    waited.as_secs(),
                    unmet.join(", ")
                )
            }
            Self::Cancelled { attempts } => {
                write!(f, "cancelled")?;
                if !attempts.is_empty() {
                    write!(f, " after ")?;
                    write_attempts(f, attempts)?;
                }
                Ok(())
            }
        }
    }
}

/// The final outcome of routing one task.
#[derive(Debug, Clone)]
pub struct Routed {
    pub status: TaskStatus,
    /// Attempts made, including the passing one.
    pub attempts: u32,
    pub result: TaskResult,
}

impl Routed {
    pub fn into_event(self) -> ProgressEvent {
        ProgressEvent::terminal(self.status, self.attempts, self.result)
    }
}

enum AttemptError {
    Failed(AttemptFailure),
    Cancelled,
}

impl From<AttemptFailure> for AttemptError {
    fn from(failure: AttemptFailure) -> Self {
        Self::Failed(failure)
    }
}

/// Composes the registry, pool, evaluator and context assembler.
pub struct TaskRouter {
    registry: Arc<CapabilityRegistry>,
    pool: Arc<ModelResourcePool>,
    evaluator: ConfidenceEvaluator,
    assembler: ContextAssembler,
    renderer: Arc<dyn PromptRenderer>,
    sessions: Arc<SessionStore>,
    metrics: Arc<RouterMetrics>,
    invoke_timeout: Duration,
}

impl TaskRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        pool: Arc<ModelResourcePool>,
        evaluator: ConfidenceEvaluator,
        assembler: ContextAssembler,
        renderer: Arc<dyn PromptRenderer>,
        sessions: Arc<SessionStore>,
        metrics: Arc<RouterMetrics>,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            pool,
            evaluator,
            assembler,
            renderer,
            sessions,
            metrics,
            invoke_timeout,
        }
    }

    /// Candidate backends for a task, in attempt order.
    ///
    /// A preferred backend moves to the front only if it supports the task
    /// type; otherwise the preference is ignored.
    pub fn candidates(&self, task: &Task) -> Vec<BackendId> {
        let mut candidates = self.registry.backends_supporting(task.task_type);
        if let Some(preferred) = task.preferred_backend {
            match candidates.iter().position(|b| *b == preferred) {
                Some(pos) => {
                    let backend = candidates.remove(pos);
                    candidates.insert(0, backend);
                }
                None => debug!(
                    task_id = %task.id,
                    backend = %preferred,
                    "Preferred backend does not support task type, ignoring"
                ),
            }
        }
        candidates
    }

    /// Route a task to completion, emitting progress events on `events`.
    ///
    /// The terminal event is left to the caller.
    pub async fn execute(
        &self,
        task: &Task,
        events: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Routed {
        let prior = self.sessions.effective_prior(task).await;

        match self.route(task, &prior, events, cancel).await {
            Ok((passed, attempts)) => {
                let updated = self
                    .sessions
                    .fold_with(task, |running| self.assembler.fold(task, &passed, running))
                    .await;

                if let Err(e) = self
                    .assembler
                    .memory()
                    .remember(&prior.session_id, &task.id, &task.input, &passed.output)
                    .await
                {
                    warn!(task_id = %task.id, error = %e, "Failed to store interaction in memory");
                }

                info!(
                    task_id = %task.id,
                    backend = %passed.backend,
                    score = passed.score,
                    attempts,
                    "Task completed"
                );
                Routed {
                    status: TaskStatus::Completed,
                    attempts,
                    result: TaskResult::completed(
                        task.id.clone(),
                        passed.output,
                        passed.score,
                        passed.backend,
                        updated,
                    ),
                }
            }
            Err(summary) => {
                let attempts = summary.attempts().len() as u32;
                let last = summary.attempts().last();
                let message = summary.to_string();
                warn!(task_id = %task.id, status = %summary.status(), error = %message, "Task did not complete");

                Routed {
                    status: summary.status(),
                    attempts,
                    result: TaskResult::failed(task.id.clone(), message, prior).with_last_attempt(
                        last.map(|a| a.backend),
                        last.and_then(|a| a.failure.score()).unwrap_or(0.0),
                    ),
                }
            }
        }
    }

    /// Walk the fallback chain.
    pub async fn route(
        &self,
        task: &Task,
        prior: &Context,
        events: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<(PassedAttempt, u32), FailureSummary> {
        let table = self.registry.table();
        let candidates = self.candidates(task);
        if candidates.is_empty() {
            return Err(FailureSummary::NoBackend {
                task_type: task.task_type,
            });
        }

        let estimated_tokens = estimate_tokens(&task.input);
        let total = candidates.len();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for (i, backend) in candidates.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(FailureSummary::Cancelled { attempts });
            }
            let Some(caps) = table.capabilities(backend) else {
                continue;
            };
            let attempt = i as u32 + 1;

            // Oversized input skips the candidate without a slot or a
            // Running event.
            let ran = estimated_tokens <= caps.max_tokens;
            let outcome = if ran {
                // A closed receiver means the consumer is gone; cancellation
                // reaches us through the token.
                let _ = events
                    .send(ProgressEvent::running(task.id.clone(), backend, attempt))
                    .await;
                debug!(task_id = %task.id, backend = %backend, attempt, "Attempt started");
                self.attempt(task, prior, backend, caps, cancel).await
            } else {
                Err(AttemptFailure::InputTooLarge {
                    estimated_tokens,
                    max_tokens: caps.max_tokens,
                }
                .into())
            };

            match outcome {
                Ok(passed) => {
                    self.metrics.record_attempt(backend, "passed");
                    return Ok((passed, attempt));
                }
                Err(AttemptError::Cancelled) => {
                    return Err(FailureSummary::Cancelled { attempts });
                }
                Err(AttemptError::Failed(failure)) => {
                    warn!(
                        task_id = %task.id,
                        backend = %backend,
                        attempt,
                        error = %failure,
                        "Attempt failed"
                    );
                    self.metrics.record_attempt(backend, failure.label());

                    let record = AttemptRecord { backend, failure };
                    if ran && i + 1 < total {
                        let _ = events
                            .send(ProgressEvent::retrying(
                                task.id.clone(),
                                backend,
                                attempt,
                                record.to_string(),
                            ))
                            .await;
                    }
                    attempts.push(record);
                }
            }
        }

        Err(FailureSummary::Exhausted {
            task_type: task.task_type,
            attempts,
        })
    }

    async fn attempt(
        &self,
        task: &Task,
        prior: &Context,
        backend: BackendId,
        caps: &ModelCapabilities,
        cancel: &CancellationToken,
    ) -> Result<PassedAttempt, AttemptError> {
        let lease = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Cancelled),
            lease = self.pool.acquire(backend) => lease.map_err(AttemptFailure::Load)?,
        };

        let input = self.assembler.assemble(task, prior).await;
        let prompt = self.renderer.render(task, &input, backend);

        // The call runs detached so a cancelled task lets it finish while
        // its result is discarded.
        let runtime = Arc::clone(self.pool.runtime());
        let call_prompt = prompt.clone();
        let timeout = self.invoke_timeout;
        let started = Instant::now();
        let call = tokio::spawn(async move {
            tokio::time::timeout(timeout, runtime.invoke(backend, &call_prompt)).await
        });

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                drop(lease);
                debug!(task_id = %task.id, backend = %backend, "Cancelled during invocation, result will be discarded");
                return Err(AttemptError::Cancelled);
            }
            joined = call => joined,
        };
        drop(lease);
        self.metrics.record_latency(backend, started.elapsed());

        let inference = match joined {
            Ok(Ok(Ok(inference))) => inference,
            Ok(Ok(Err(e))) => return Err(AttemptFailure::Backend(e).into()),
            Ok(Err(_)) => {
                return Err(AttemptFailure::Backend(BackendError::Timeout { backend, timeout }).into())
            }
            Err(e) => {
                return Err(AttemptFailure::Backend(BackendError::Runtime {
                    backend,
                    reason: e.to_string(),
                })
                .into())
            }
        };

        if cancel.is_cancelled() {
            return Err(AttemptError::Cancelled);
        }

        let score = self.evaluator.clamp(inference.confidence, caps);
        let threshold = task.confidence_threshold;
        let candidate = TaskResult::completed(
            task.id.clone(),
            inference.text,
            score,
            backend,
            input.context,
        );
        if !self.evaluator.accepts(task, &candidate) {
            return Err(AttemptFailure::LowConfidence { score, threshold }.into());
        }
        if !self.evaluator.passes(task, &candidate) {
            warn!(
                task_id = %task.id,
                backend = %backend,
                score,
                threshold,
                "Accepting result below threshold (advisory mode)"
            );
        }

        Ok(PassedAttempt {
            backend,
            output: candidate.output,
            score,
            metadata: inference.metadata,
            retrieved: input.retrieved,
            prompt,
        })
    }
}
