//! ModelRoute Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/gRPC
//! - Model runtimes
//! - Runtime specifics
//!
//! All types here represent the core business domain of ModelRoute: tasks,
//! the contexts threaded between them, backends and what they can do, and
//! the results and progress events routing produces.

pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod model;
pub mod result;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use context::{clamp_unit, Context, ContextUpdate};
pub use error::CoreError;
pub use event::ProgressEvent;
pub use ids::{SessionId, TaskId};
pub use model::{BackendId, ModelCapabilities};
pub use result::TaskResult;
pub use status::TaskStatus;
pub use task::{Priority, Task, TaskType};
