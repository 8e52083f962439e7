//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::confidence::ConfidenceEvaluator;
use crate::context::ContextAssembler;
use crate::memory::MemoryStore;
use crate::metrics::RouterMetrics;
use crate::pool::ModelResourcePool;
use crate::registry::CapabilityRegistry;
use crate::render::TemplateRenderer;
use crate::resolver::DependencyResolver;
use crate::router::TaskRouter;
use crate::runtime::ModelRuntime;
use crate::scheduler::Scheduler;
use crate::session::SessionStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,

    /// Backend capability table.
    pub registry: Arc<CapabilityRegistry>,

    /// Resident backends under the memory budget.
    pub pool: Arc<ModelResourcePool>,

    /// Dependency graph of submitted tasks.
    pub resolver: Arc<DependencyResolver>,

    /// Running context per session.
    pub sessions: Arc<SessionStore>,

    pub metrics: Arc<RouterMetrics>,

    pub router: Arc<TaskRouter>,

    pub scheduler: Arc<Scheduler>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the engine, start dispatching, and warm pinned backends.
    pub async fn init(
        config: Config,
        registry: Arc<CapabilityRegistry>,
        runtime: Arc<dyn ModelRuntime>,
        memory: Arc<dyn MemoryStore>,
    ) -> Arc<Self> {
        let pool = ModelResourcePool::new(
            config.memory_budget_mb,
            config.acquire_timeout,
            runtime,
            Arc::clone(&registry),
        );
        let sessions = Arc::new(SessionStore::new());
        let metrics = Arc::new(RouterMetrics::new());
        let resolver = Arc::new(DependencyResolver::new());

        let router = Arc::new(TaskRouter::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            ConfidenceEvaluator::new(config.threshold_mode),
            ContextAssembler::new(memory, config.max_documents, config.context_decay),
            Arc::new(TemplateRenderer::new()),
            Arc::clone(&sessions),
            Arc::clone(&metrics),
            config.invoke_timeout,
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&resolver),
            Arc::clone(&router),
            config.max_concurrent_tasks,
            config.pending_timeout,
        );
        scheduler.start();

        for backend in &config.pinned {
            pool.pin(*backend);
            match pool.warm(*backend).await {
                Ok(()) => info!(backend = %backend, "Pinned backend loaded"),
                Err(e) => warn!(backend = %backend, error = %e, "Failed to load pinned backend"),
            }
        }

        Arc::new(Self {
            config,
            registry,
            pool,
            resolver,
            sessions,
            metrics,
            router,
            scheduler,
            started_at: Utc::now(),
        })
    }

    /// Cancel open tasks and unload every backend.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        self.pool.drain().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> Arc<AppState> {
    test_state_with(Config::default(), crate::test_support::ScriptedRuntime::new()).await
}

#[cfg(test)]
pub(crate) async fn test_state_with(
    config: Config,
    runtime: crate::test_support::ScriptedRuntime,
) -> Arc<AppState> {
    use crate::memory::InMemoryStore;
    use crate::registry::RegistryTable;

    AppState::init(
        config,
        Arc::new(CapabilityRegistry::new(RegistryTable::builtin())),
        Arc::new(runtime),
        Arc::new(InMemoryStore::new()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRuntime;
    use modelroute_core::BackendId;

    #[tokio::test]
    async fn test_pinned_backends_are_warmed() {
        let config = Config {
            pinned: vec![BackendId::Phi],
            ..Config::default()
        };
        let state = test_state_with(config, ScriptedRuntime::new()).await;

        let handles = state.pool.snapshot();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].backend, BackendId::Phi);
        assert!(handles[0].pinned);
        assert_eq!(handles[0].ref_count, 0);
    }

    #[tokio::test]
    async fn test_shutdown_unloads_everything() {
        let config = Config {
            pinned: vec![BackendId::Phi, BackendId::Huginn],
            ..Config::default()
        };
        let state = test_state_with(config, ScriptedRuntime::new()).await;
        assert_eq!(state.pool.resident_cost(), 2800 + 1200);

        state.shutdown().await;
        assert_eq!(state.pool.resident_cost(), 0);
        assert!(state.scheduler.submit(modelroute_core::Task::new(
            modelroute_core::TaskType::Explanation,
            "hi"
        ))
        .await
        .is_err());
    }
}
