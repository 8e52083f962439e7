//! Core domain errors.

use thiserror::Error;

use crate::TaskId;

/// Core domain errors for ModelRoute.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed task or request, rejected before admission.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Task id already admitted; ids are never reused.
    #[error("Validation error: task id {0} was already submitted")]
    DuplicateTask(TaskId),

    /// Task lists itself as a dependency.
    #[error("Validation error: task {0} depends on itself")]
    SelfDependency(TaskId),

    /// Admitting the task would close a dependency cycle.
    #[error("Dependency cycle: {}", format_cycle(.0))]
    Cycle(Vec<TaskId>),

    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Backend name not recognised.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Invalid state transition.
    #[error("Invalid state transition for {task}: {from} -> {to}")]
    InvalidStateTransition {
        task: TaskId,
        from: String,
        to: String,
    },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// True for errors that reject a task before admission.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::DuplicateTask(_) | Self::SelfDependency(_) | Self::Cycle(_)
        )
    }
}

fn format_cycle(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = CoreError::Cycle(vec![TaskId::new("a"), TaskId::new("b"), TaskId::new("a")]);
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
        assert!(err.is_rejection());
    }
}
