//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use modelroute_core::{BackendId, TaskStatus};

use crate::state::AppState;

/// Attempt outcome labels, in exposition order.
const OUTCOMES: [&str; 5] = [
    "passed",
    "low_confidence",
    "backend_error",
    "load_error",
    "input_too_large",
];

const STATUSES: [TaskStatus; 7] = [
    TaskStatus::Pending,
    TaskStatus::Eligible,
    TaskStatus::Running,
    TaskStatus::Retrying,
    TaskStatus::Completed,
    TaskStatus::Failed,
    TaskStatus::Cancelled,
];

/// Per-backend routing counters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BackendStats {
    /// Attempts by outcome label.
    pub outcomes: HashMap<&'static str, u64>,
    pub invocations: u64,
    pub latency_ms_sum: u64,
}

impl BackendStats {
    pub fn outcome(&self, label: &str) -> u64 {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Counters recorded by the router.
#[derive(Default)]
pub struct RouterMetrics {
    backends: Mutex<HashMap<BackendId, BackendStats>>,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BackendId, BackendStats>> {
        self.backends.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_attempt(&self, backend: BackendId, outcome: &'static str) {
        *self
            .lock()
            .entry(backend)
            .or_default()
            .outcomes
            .entry(outcome)
            .or_insert(0) += 1;
    }

    /// Record one completed backend call.
    pub fn record_latency(&self, backend: BackendId, elapsed: Duration) {
        let mut backends = self.lock();
        let stats = backends.entry(backend).or_default();
        stats.invocations += 1;
        stats.latency_ms_sum += elapsed.as_millis() as u64;
    }

    pub fn snapshot(&self, backend: BackendId) -> BackendStats {
        self.lock().get(&backend).cloned().unwrap_or_default()
    }
}

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_pool_metrics(state, &mut output);
    collect_attempt_metrics(state, &mut output);
    collect_task_metrics(state, &mut output);
    collect_session_metrics(state, &mut output).await;

    output
}

/// Residency and budget of the resource pool.
fn collect_pool_metrics(state: &Arc<AppState>, output: &mut String) {
    let stats = state.pool.stats();
    let handles = state.pool.snapshot();

    writeln!(
        output,
        "# HELP modelroute_pool_budget_mb Memory budget of the resource pool"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_pool_budget_mb gauge").ok();
    writeln!(output, "modelroute_pool_budget_mb {}", stats.budget_mb).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_pool_resident_mb Memory held by resident backends"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_pool_resident_mb gauge").ok();
    writeln!(output, "modelroute_pool_resident_mb {}", stats.resident_mb).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_pool_reserved_mb Memory reserved by loads in flight"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_pool_reserved_mb gauge").ok();
    writeln!(output, "modelroute_pool_reserved_mb {}", stats.reserved_mb).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_backend_resident Whether a backend is resident"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_backend_resident gauge").ok();
    for backend in BackendId::ALL {
        let resident = handles.iter().any(|h| h.backend == backend) as u8;
        writeln!(
            output,
            "modelroute_backend_resident{{backend=\"{backend}\"}} {resident}"
        )
        .ok();
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_backend_refs Outstanding leases per resident backend"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_backend_refs gauge").ok();
    for handle in &handles {
        writeln!(
            output,
            "modelroute_backend_refs{{backend=\"{}\",pinned=\"{}\"}} {}",
            handle.backend, handle.pinned, handle.ref_count
        )
        .ok();
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_pool_events_total Pool lifecycle events"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_pool_events_total counter").ok();
    writeln!(
        output,
        "modelroute_pool_events_total{{event=\"load\"}} {}",
        stats.counters.loads
    )
    .ok();
    writeln!(
        output,
        "modelroute_pool_events_total{{event=\"load_failure\"}} {}",
        stats.counters.load_failures
    )
    .ok();
    writeln!(
        output,
        "modelroute_pool_events_total{{event=\"eviction\"}} {}",
        stats.counters.evictions
    )
    .ok();
}

/// Candidate attempts by backend and outcome.
fn collect_attempt_metrics(state: &Arc<AppState>, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_attempts_total Candidate attempts by backend and outcome"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_attempts_total counter").ok();
    let mut latency = Vec::new();
    for backend in BackendId::ALL {
        let stats = state.metrics.snapshot(backend);
        for outcome in OUTCOMES {
            writeln!(
                output,
                "modelroute_attempts_total{{backend=\"{backend}\",outcome=\"{outcome}\"}} {}",
                stats.outcome(outcome)
            )
            .ok();
        }
        latency.push((backend, stats));
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_invoke_latency_ms Backend call latency"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_invoke_latency_ms summary").ok();
    for (backend, stats) in latency {
        writeln!(
            output,
            "modelroute_invoke_latency_ms_sum{{backend=\"{backend}\"}} {}",
            stats.latency_ms_sum
        )
        .ok();
        writeln!(
            output,
            "modelroute_invoke_latency_ms_count{{backend=\"{backend}\"}} {}",
            stats.invocations
        )
        .ok();
    }
}

/// Tasks known to the resolver, by state.
fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let counts = state.resolver.counts();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_tasks_total Total number of tasks by status"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_tasks_total gauge").ok();
    for status in STATUSES {
        let label = status.as_str().to_lowercase();
        let count = counts.get(&status).copied().unwrap_or(0);
        writeln!(
            output,
            "modelroute_tasks_total{{status=\"{label}\"}} {count}"
        )
        .ok();
    }
}

async fn collect_session_metrics(state: &Arc<AppState>, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP modelroute_sessions Sessions with a running context"
    )
    .ok();
    writeln!(output, "# TYPE modelroute_sessions gauge").ok();
    writeln!(output, "modelroute_sessions {}", state.sessions.len().await).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;

    #[test]
    fn test_router_metrics_accumulate() {
        let metrics = RouterMetrics::new();
        metrics.record_attempt(BackendId::Phi, "passed");
        metrics.record_attempt(BackendId::Phi, "low_confidence");
        metrics.record_attempt(BackendId::Phi, "passed");
        metrics.record_latency(BackendId::Phi, Duration::from_millis(40));
        metrics.record_latency(BackendId::Phi, Duration::from_millis(60));

        let stats = metrics.snapshot(BackendId::Phi);
        assert_eq!(stats.outcome("passed"), 2);
        assert_eq!(stats.outcome("low_confidence"), 1);
        assert_eq!(stats.outcome("load_error"), 0);
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.latency_ms_sum, 100);
        assert_eq!(metrics.snapshot(BackendId::Mixtral), BackendStats::default());
    }

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let state = test_state().await;
        let output = collect_metrics(&state).await;

        assert!(output.contains("modelroute_pool_budget_mb 16000"));
        assert!(output.contains("modelroute_pool_resident_mb 0"));
        assert!(output.contains("modelroute_backend_resident{backend=\"deepseek\"} 0"));
        assert!(output.contains(
            "modelroute_attempts_total{backend=\"friday\",outcome=\"passed\"} 0"
        ));
        assert!(output.contains("modelroute_tasks_total{status=\"pending\"} 0"));
        assert!(output.contains("modelroute_tasks_total{status=\"cancelled\"} 0"));
        assert!(output.contains("modelroute_sessions 0"));
    }
}
