//! Converters between proto types and domain types.

use crate::pb;
use modelroute_core::{
    clamp_unit, BackendId, Context, ContextUpdate, CoreError, ModelCapabilities, Priority, ProgressEvent,
    SessionId, Task, TaskId, TaskResult, TaskStatus, TaskType,
};

// ============================================================================
// BackendId conversions
// ============================================================================

impl From<BackendId> for pb::ModelType {
    fn from(backend: BackendId) -> Self {
        match backend {
            BackendId::Friday => pb::ModelType::Friday,
            BackendId::DeepSeek => pb::ModelType::Deepseek,
            BackendId::Huginn => pb::ModelType::Huginn,
            BackendId::Mixtral => pb::ModelType::Mixtral,
            BackendId::Phi => pb::ModelType::Phi,
        }
    }
}

/// Decode a wire backend. `UNSPECIFIED` maps to `None`; numbers outside the
/// enum are a validation error.
pub fn backend_from_wire(value: i32) -> Result<Option<BackendId>, CoreError> {
    let model = pb::ModelType::try_from(value)
        .map_err(|_| CoreError::Validation(format!("unknown model type: {value}")))?;
    Ok(match model {
        pb::ModelType::Unspecified => None,
        pb::ModelType::Friday => Some(BackendId::Friday),
        pb::ModelType::Deepseek => Some(BackendId::DeepSeek),
        pb::ModelType::Huginn => Some(BackendId::Huginn),
        pb::ModelType::Mixtral => Some(BackendId::Mixtral),
        pb::ModelType::Phi => Some(BackendId::Phi),
    })
}

fn backend_to_wire(backend: Option<BackendId>) -> i32 {
    backend
        .map(pb::ModelType::from)
        .unwrap_or(pb::ModelType::Unspecified) as i32
}

// ============================================================================
// TaskType conversions
// ============================================================================

impl From<TaskType> for pb::TaskType {
    fn from(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Explanation => pb::TaskType::Explanation,
            TaskType::Generation => pb::TaskType::Generation,
            TaskType::Debugging => pb::TaskType::Debugging,
            TaskType::TestGeneration => pb::TaskType::TestGeneration,
            TaskType::Documentation => pb::TaskType::Documentation,
            TaskType::GeneralConversation => pb::TaskType::GeneralConversation,
        }
    }
}

impl TryFrom<pb::TaskType> for TaskType {
    type Error = CoreError;

    fn try_from(task_type: pb::TaskType) -> Result<Self, Self::Error> {
        match task_type {
            pb::TaskType::Unknown => Err(CoreError::Validation(
                "task type is unknown or unset".to_string(),
            )),
            pb::TaskType::Explanation => Ok(TaskType::Explanation),
            pb::TaskType::Generation => Ok(TaskType::Generation),
            pb::TaskType::Debugging => Ok(TaskType::Debugging),
            pb::TaskType::TestGeneration => Ok(TaskType::TestGeneration),
            pb::TaskType::Documentation => Ok(TaskType::Documentation),
            pb::TaskType::GeneralConversation => Ok(TaskType::GeneralConversation),
        }
    }
}

fn task_type_from_wire(value: i32) -> Result<TaskType, CoreError> {
    pb::TaskType::try_from(value)
        .map_err(|_| CoreError::Validation(format!("unknown task type: {value}")))?
        .try_into()
}

// ============================================================================
// Priority conversions
// ============================================================================

impl From<Priority> for pb::Priority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => pb::Priority::Low,
            Priority::Medium => pb::Priority::Medium,
            Priority::High => pb::Priority::High,
        }
    }
}

impl From<pb::Priority> for Priority {
    fn from(priority: pb::Priority) -> Self {
        match priority {
            pb::Priority::Unspecified => Priority::Medium,
            pb::Priority::Low => Priority::Low,
            pb::Priority::Medium => Priority::Medium,
            pb::Priority::High => Priority::High,
        }
    }
}

// ============================================================================
// TaskStatus conversions
// ============================================================================

impl From<TaskStatus> for pb::TaskStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => pb::TaskStatus::Pending,
            TaskStatus::Eligible => pb::TaskStatus::Eligible,
            TaskStatus::Running => pb::TaskStatus::Running,
            TaskStatus::Retrying => pb::TaskStatus::Retrying,
            TaskStatus::Completed => pb::TaskStatus::Completed,
            TaskStatus::Failed => pb::TaskStatus::Failed,
            TaskStatus::Cancelled => pb::TaskStatus::Cancelled,
        }
    }
}

impl From<pb::TaskStatus> for TaskStatus {
    fn from(status: pb::TaskStatus) -> Self {
        match status {
            pb::TaskStatus::Unspecified => TaskStatus::Pending,
            pb::TaskStatus::Pending => TaskStatus::Pending,
            pb::TaskStatus::Eligible => TaskStatus::Eligible,
            pb::TaskStatus::Running => TaskStatus::Running,
            pb::TaskStatus::Retrying => TaskStatus::Retrying,
            pb::TaskStatus::Completed => TaskStatus::Completed,
            pb::TaskStatus::Failed => TaskStatus::Failed,
            pb::TaskStatus::Cancelled => TaskStatus::Cancelled,
        }
    }
}

// ============================================================================
// Context conversions
// ============================================================================

impl From<Context> for pb::Context {
    fn from(ctx: Context) -> Self {
        pb::Context {
            session_id: ctx.session_id.into_inner(),
            previous_tasks: ctx
                .previous_tasks
                .into_iter()
                .map(TaskId::into_inner)
                .collect(),
            metadata: ctx.metadata,
            confidence_score: Some(ctx.confidence_score),
            relevant_documents: ctx.relevant_documents,
        }
    }
}

impl From<pb::Context> for Context {
    fn from(proto: pb::Context) -> Self {
        Context {
            session_id: SessionId::or_default(proto.session_id),
            previous_tasks: proto.previous_tasks.into_iter().map(TaskId::new).collect(),
            metadata: proto.metadata,
            confidence_score: proto.confidence_score.map(clamp_unit).unwrap_or_default(),
            relevant_documents: proto.relevant_documents,
        }
    }
}

impl From<pb::Context> for ContextUpdate {
    fn from(proto: pb::Context) -> Self {
        let confidence_score = proto.confidence_score.map(clamp_unit);
        ContextUpdate {
            context: Context::from(proto),
            confidence_score,
        }
    }
}

// ============================================================================
// Task conversions
// ============================================================================

impl TryFrom<pb::Task> for Task {
    type Error = CoreError;

    fn try_from(proto: pb::Task) -> Result<Self, Self::Error> {
        let task_type = task_type_from_wire(proto.task_type)?;
        let preferred_backend = match proto.preferred_model {
            Some(value) => backend_from_wire(value)?,
            None => None,
        };
        let priority = pb::Priority::try_from(proto.priority)
            .map_err(|_| CoreError::Validation(format!("unknown priority: {}", proto.priority)))?
            .into();
        let id = if proto.task_id.is_empty() {
            TaskId::generate()
        } else {
            TaskId::new(proto.task_id)
        };

        let mut task = Task::new(task_type, proto.input)
            .with_id(id)
            .with_priority(priority)
            .with_threshold(proto.confidence_threshold)
            .with_context(proto.context.map(Context::from).unwrap_or_default());
        task.preferred_backend = preferred_backend;
        task.dependencies = proto.dependencies.into_iter().map(TaskId::new).collect();
        Ok(task)
    }
}

impl From<Task> for pb::Task {
    fn from(task: Task) -> Self {
        pb::Task {
            task_id: task.id.into_inner(),
            task_type: pb::TaskType::from(task.task_type) as i32,
            input: task.input,
            context: Some(task.context.into()),
            priority: pb::Priority::from(task.priority) as i32,
            preferred_model: task
                .preferred_backend
                .map(|b| pb::ModelType::from(b) as i32),
            confidence_threshold: task.confidence_threshold,
            dependencies: task
                .dependencies
                .into_iter()
                .map(TaskId::into_inner)
                .collect(),
        }
    }
}

// ============================================================================
// TaskResult conversions
// ============================================================================

impl From<TaskResult> for pb::TaskResult {
    fn from(result: TaskResult) -> Self {
        let status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        pb::TaskResult {
            task_id: result.task_id.into_inner(),
            success: result.success,
            output: result.output,
            confidence_score: result.confidence_score,
            executed_by: backend_to_wire(result.executed_by),
            error_message: result.error_message,
            updated_context: Some(result.updated_context.into()),
            status: pb::TaskStatus::from(status) as i32,
            attempt: 0,
        }
    }
}

impl From<pb::TaskResult> for TaskResult {
    fn from(proto: pb::TaskResult) -> Self {
        TaskResult {
            task_id: TaskId::new(proto.task_id),
            success: proto.success,
            output: proto.output,
            confidence_score: clamp_unit(proto.confidence_score),
            executed_by: backend_from_wire(proto.executed_by).ok().flatten(),
            error_message: proto.error_message,
            updated_context: proto.updated_context.map(Context::from).unwrap_or_default(),
        }
    }
}

// ============================================================================
// ProgressEvent conversions
// ============================================================================

impl From<ProgressEvent> for pb::TaskResult {
    fn from(event: ProgressEvent) -> Self {
        let status = pb::TaskStatus::from(event.status) as i32;
        match event.result {
            Some(result) => pb::TaskResult {
                status,
                attempt: event.attempt,
                ..pb::TaskResult::from(result)
            },
            None => pb::TaskResult {
                task_id: event.task_id.into_inner(),
                success: false,
                output: String::new(),
                confidence_score: 0.0,
                executed_by: backend_to_wire(event.backend),
                error_message: event.detail,
                updated_context: None,
                status,
                attempt: event.attempt,
            },
        }
    }
}

// ============================================================================
// ModelCapabilities conversions
// ============================================================================

impl From<ModelCapabilities> for pb::ModelCapabilities {
    fn from(caps: ModelCapabilities) -> Self {
        pb::ModelCapabilities {
            model_type: pb::ModelType::from(caps.backend) as i32,
            supported_tasks: caps
                .supported_tasks
                .into_iter()
                .map(|t| pb::TaskType::from(t) as i32)
                .collect(),
            min_confidence: caps.min_confidence,
            max_confidence: caps.max_confidence,
            max_tokens: caps.max_tokens,
            average_latency_ms: caps.average_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_task(task_type: pb::TaskType) -> pb::Task {
        pb::Task {
            task_id: "t-1".to_string(),
            task_type: task_type as i32,
            input: "explain lifetimes".to_string(),
            context: None,
            priority: pb::Priority::High as i32,
            preferred_model: None,
            confidence_threshold: 0.8,
            dependencies: vec!["t-0".to_string()],
        }
    }

    #[test]
    fn test_task_from_wire() {
        let task = Task::try_from(wire_task(pb::TaskType::Explanation)).unwrap();
        assert_eq!(task.id.as_str(), "t-1");
        assert_eq!(task.task_type, TaskType::Explanation);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.dependencies, vec![TaskId::new("t-0")]);
        assert_eq!(task.context.session_id.as_str(), "default");
    }

    #[test]
    fn test_unknown_task_type_is_rejected() {
        let err = Task::try_from(wire_task(pb::TaskType::Unknown)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let mut bogus = wire_task(pb::TaskType::Generation);
        bogus.task_type = 42;
        assert!(Task::try_from(bogus).is_err());
    }

    #[test]
    fn test_unspecified_preferred_model_is_none() {
        let mut proto = wire_task(pb::TaskType::Generation);
        proto.preferred_model = Some(pb::ModelType::Unspecified as i32);
        let task = Task::try_from(proto).unwrap();
        assert_eq!(task.preferred_backend, None);

        let mut proto = wire_task(pb::TaskType::Generation);
        proto.preferred_model = Some(pb::ModelType::Deepseek as i32);
        let task = Task::try_from(proto).unwrap();
        assert_eq!(task.preferred_backend, Some(BackendId::DeepSeek));
    }

    #[test]
    fn test_empty_task_id_is_generated() {
        let mut proto = wire_task(pb::TaskType::Generation);
        proto.task_id.clear();
        let task = Task::try_from(proto).unwrap();
        assert!(!task.id.is_empty());
    }

    #[test]
    fn test_context_update_confidence_presence() {
        let wire = pb::Context {
            session_id: "s".to_string(),
            metadata: [("lang".to_string(), "rust".to_string())].into(),
            ..Default::default()
        };
        let update = ContextUpdate::from(wire.clone());
        assert_eq!(update.confidence_score, None);
        assert_eq!(update.session_id().as_str(), "s");

        let update = ContextUpdate::from(pb::Context {
            confidence_score: Some(1.4),
            ..wire
        });
        assert_eq!(update.confidence_score, Some(1.0));
    }

    #[test]
    fn test_progress_event_to_wire() {
        let event = ProgressEvent::retrying(TaskId::new("t"), BackendId::Huginn, 1, "low confidence");
        let proto: pb::TaskResult = event.into();
        assert_eq!(proto.status, pb::TaskStatus::Retrying as i32);
        assert_eq!(proto.executed_by, pb::ModelType::Huginn as i32);
        assert_eq!(proto.error_message.as_deref(), Some("low confidence"));
        assert!(!proto.success);

        let result = TaskResult::completed(
            TaskId::new("t"),
            "done",
            0.9,
            BackendId::Phi,
            Context::default(),
        );
        let proto: pb::TaskResult = ProgressEvent::terminal(TaskStatus::Completed, 2, result).into();
        assert_eq!(proto.status, pb::TaskStatus::Completed as i32);
        assert_eq!(proto.attempt, 2);
        assert!(proto.success);
    }
}
