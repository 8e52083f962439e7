//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use modelroute_core::BackendId;

use crate::confidence::ThresholdMode;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// gRPC server bind address.
    pub grpc_addr: String,

    /// HTTP server bind address (health, metrics, admin).
    pub http_addr: String,

    /// Memory budget for resident backends (MB).
    pub memory_budget_mb: u64,

    /// How long an attempt waits for a pool slot.
    pub acquire_timeout: Duration,

    /// Upper bound on one backend call.
    pub invoke_timeout: Duration,

    /// How long a task may wait for its dependencies.
    pub pending_timeout: Duration,

    /// Tasks routed at the same time.
    pub max_concurrent_tasks: usize,

    /// Weight of the prior confidence when folding a result into the
    /// running context.
    pub context_decay: f64,

    /// Memory documents retrieved per prompt.
    pub max_documents: usize,

    /// Whether the confidence threshold gates acceptance.
    pub threshold_mode: ThresholdMode,

    /// Backends loaded at startup and never evicted.
    pub pinned: Vec<BackendId>,

    /// Capability table to load instead of the built-in one.
    pub registry_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grpc_addr: "[::1]:50051".to_string(),
            http_addr: "[::1]:50052".to_string(),
            memory_budget_mb: 16_000,
            acquire_timeout: Duration::from_secs(30),
            invoke_timeout: Duration::from_secs(120),
            pending_timeout: Duration::from_secs(600),
            max_concurrent_tasks: 4,
            context_decay: 0.7,
            max_documents: 3,
            threshold_mode: ThresholdMode::Hard,
            pinned: Vec::new(),
            registry_path: None,
        }
    }
}
