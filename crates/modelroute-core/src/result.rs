//! Task results.

use serde::{Deserialize, Serialize};

use crate::{BackendId, Context, TaskId};

/// Final outcome of routing one task.
///
/// `error_message` is set if and only if `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task this result belongs to.
    pub task_id: TaskId,

    /// True when a backend produced an accepted result.
    pub success: bool,

    /// Output text of the accepted attempt (empty on failure).
    pub output: String,

    /// Clamped confidence of the last attempt, in [0, 1].
    pub confidence_score: f64,

    /// Backend that produced the output (on failure, the last one tried).
    pub executed_by: Option<BackendId>,

    /// Human-readable failure description.
    pub error_message: Option<String>,

    /// Context after this task.
    pub updated_context: Context,
}

impl TaskResult {
    /// Create a successful result.
    pub fn completed(
        task_id: TaskId,
        output: impl Into<String>,
        confidence_score: f64,
        executed_by: BackendId,
        updated_context: Context,
    ) -> Self {
        Self {
            task_id,
            success: true,
            output: output.into(),
            confidence_score,
            executed_by: Some(executed_by),
            error_message: None,
            updated_context,
        }
    }

    /// Create a failed result. The context is returned unchanged.
    pub fn failed(task_id: TaskId, error: impl Into<String>, context: Context) -> Self {
        Self {
            task_id,
            success: false,
            output: String::new(),
            confidence_score: 0.0,
            executed_by: None,
            error_message: Some(error.into()),
            updated_context: context,
        }
    }

    /// Builder method to record the last backend tried and its score.
    pub fn with_last_attempt(mut self, backend: Option<BackendId>, score: f64) -> Self {
        self.executed_by = backend;
        self.confidence_score = score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_error_are_exclusive() {
        let ok = TaskResult::completed(
            TaskId::new("t"),
            "out",
            0.9,
            BackendId::Friday,
            Context::default(),
        );
        assert!(ok.success && ok.error_message.is_none());

        let failed = TaskResult::failed(TaskId::new("t"), "boom", Context::default());
        assert!(!failed.success && failed.error_message.is_some());
        assert!(failed.output.is_empty());
    }
}
