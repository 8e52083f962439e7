//! Progress events emitted while a task is routed.

use serde::{Deserialize, Serialize};

use crate::{BackendId, TaskId, TaskResult, TaskStatus};

/// One step in a task's progress stream.
///
/// A stream contains one `Running` event per candidate attempt, one
/// `Retrying` event per fallback, and exactly one terminal event carrying the
/// final [`TaskResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Task this event belongs to.
    pub task_id: TaskId,
    /// Lifecycle state entered.
    pub status: TaskStatus,
    /// Backend bound to the attempt, if any.
    pub backend: Option<BackendId>,
    /// 1-based attempt number; 0 before the first attempt.
    pub attempt: u32,
    /// Why the task is retrying, or other detail.
    pub detail: Option<String>,
    /// Final result, present exactly on terminal events.
    pub result: Option<TaskResult>,
}

impl ProgressEvent {
    /// Create a Running event for a candidate attempt.
    pub fn running(task_id: TaskId, backend: BackendId, attempt: u32) -> Self {
        Self {
            task_id,
            status: TaskStatus::Running,
            backend: Some(backend),
            attempt,
            detail: None,
            result: None,
        }
    }

    /// Create a Retrying event after a failed attempt.
    pub fn retrying(
        task_id: TaskId,
        failed_backend: BackendId,
        attempt: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Retrying,
            backend: Some(failed_backend),
            attempt,
            detail: Some(reason.into()),
            result: None,
        }
    }

    /// Create the terminal event for a result.
    ///
    /// `status` must be terminal; success maps to Completed regardless.
    pub fn terminal(status: TaskStatus, attempt: u32, result: TaskResult) -> Self {
        let status = if result.success {
            TaskStatus::Completed
        } else {
            status
        };
        Self {
            task_id: result.task_id.clone(),
            status,
            backend: result.executed_by,
            attempt,
            detail: result.error_message.clone(),
            result: Some(result),
        }
    }

    /// Returns true if this is the last event of its stream.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;

    #[test]
    fn test_running_event() {
        let event = ProgressEvent::running(TaskId::new("t"), BackendId::Phi, 1);
        assert_eq!(event.status, TaskStatus::Running);
        assert_eq!(event.backend, Some(BackendId::Phi));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_event_carries_result() {
        let result = TaskResult::failed(TaskId::new("t"), "no backend", Context::default());
        let event = ProgressEvent::terminal(TaskStatus::Failed, 2, result);
        assert!(event.is_terminal());
        assert_eq!(event.detail.as_deref(), Some("no backend"));
        assert!(event.result.is_some());
    }
}
