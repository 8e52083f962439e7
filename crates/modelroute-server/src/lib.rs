//! ModelRoute Server Library
//!
//! This crate provides the routing engine: capability registry, resource
//! pool, dependency resolution, context assembly and the task router, plus
//! the gRPC service and HTTP endpoints that expose them.

pub mod confidence;
pub mod config;
pub mod context;
pub mod http;
pub mod memory;
pub mod metrics;
pub mod pool;
pub mod progress;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod router;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use confidence::{ConfidenceEvaluator, ThresholdMode};
pub use config::Config;
pub use context::ContextAssembler;
pub use memory::{InMemoryStore, MemoryStore};
pub use pool::ModelResourcePool;
pub use progress::ProgressStream;
pub use registry::{CapabilityRegistry, RegistryTable};
pub use resolver::DependencyResolver;
pub use router::TaskRouter;
pub use runtime::{MockRuntime, ModelRuntime};
pub use scheduler::{Scheduler, SchedulerError};
pub use service::ModelRouterServiceImpl;
pub use state::AppState;
