//! Task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{BackendId, Context, CoreError, TaskId};

/// Kind of work a task asks for. Backends declare which kinds they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Explanation,
    Generation,
    Debugging,
    TestGeneration,
    Documentation,
    GeneralConversation,
}

impl TaskType {
    /// Every task type.
    pub const ALL: [TaskType; 6] = [
        TaskType::Explanation,
        TaskType::Generation,
        TaskType::Debugging,
        TaskType::TestGeneration,
        TaskType::Documentation,
        TaskType::GeneralConversation,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Explanation => "explanation",
            TaskType::Generation => "generation",
            TaskType::Debugging => "debugging",
            TaskType::TestGeneration => "test_generation",
            TaskType::Documentation => "documentation",
            TaskType::GeneralConversation => "general_conversation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::Validation(format!("unknown task type: {s}")))
    }
}

/// Scheduling priority. Ordered so that `High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(CoreError::Validation(format!("unknown priority: {other}"))),
        }
    }
}

/// A unit of work submitted for routing.
///
/// Immutable once submitted; lifecycle state is tracked by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Kind of work requested.
    pub task_type: TaskType,

    /// Input text.
    pub input: String,

    /// Context snapshot the caller submitted with the task.
    pub context: Context,

    /// Scheduling priority.
    pub priority: Priority,

    /// Backend to try first, if it supports the task type.
    pub preferred_backend: Option<BackendId>,

    /// Minimum (clamped) confidence a result needs to be accepted.
    pub confidence_threshold: f64,

    /// Tasks that must complete successfully before this one may run.
    pub dependencies: Vec<TaskId>,

    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Default confidence threshold when the caller does not set one.
    pub const DEFAULT_THRESHOLD: f64 = 0.7;

    /// Create a new Task with a generated id.
    pub fn new(task_type: TaskType, input: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            task_type,
            input: input.into(),
            context: Context::default(),
            priority: Priority::default(),
            preferred_backend: None,
            confidence_threshold: Self::DEFAULT_THRESHOLD,
            dependencies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Builder method to set a specific ID.
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder method to set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to set the preferred backend.
    pub fn with_preferred_backend(mut self, backend: BackendId) -> Self {
        self.preferred_backend = Some(backend);
        self
    }

    /// Builder method to set the confidence threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Builder method to add a dependency.
    pub fn with_dependency(mut self, id: impl Into<TaskId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Builder method to set the context snapshot.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Check the task is well-formed before admission.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::Validation("task id is required".to_string()));
        }
        if self.input.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "task {}: input is required",
                self.id
            )));
        }
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(CoreError::Validation(format!(
                "task {}: confidence threshold {} is not within [0, 1]",
                self.id, self.confidence_threshold
            )));
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if dep == &self.id {
                return Err(CoreError::SelfDependency(self.id.clone()));
            }
            if !seen.insert(dep) {
                return Err(CoreError::Validation(format!(
                    "task {}: dependency {} listed twice",
                    self.id, dep
                )));
            }
        }
        Ok(())
    }
}
