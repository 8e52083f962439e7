//! Backend identifiers and declared model capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::task::TaskType;

/// A model backend the router can dispatch to.
///
/// This is a closed set: adding a backend means adding a variant, and every
/// `match` over backends must handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// Conversational persona model.
    Friday,
    /// Code-specialist model.
    DeepSeek,
    /// Small, fast chat model.
    Huginn,
    /// General-knowledge mixture-of-experts model.
    Mixtral,
    /// Natural-language specialist.
    Phi,
}

impl BackendId {
    /// Every known backend, in declaration order.
    pub const ALL: [BackendId; 5] = [
        BackendId::Friday,
        BackendId::DeepSeek,
        BackendId::Huginn,
        BackendId::Mixtral,
        BackendId::Phi,
    ];

    /// Stable lowercase name used in logs, metrics and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Friday => "friday",
            BackendId::DeepSeek => "deepseek",
            BackendId::Huginn => "huginn",
            BackendId::Mixtral => "mixtral",
            BackendId::Phi => "phi",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendId::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownBackend(s.to_string()))
    }
}

/// What a backend can do, as declared once at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Backend these capabilities describe.
    pub backend: BackendId,

    /// Task types this backend accepts.
    pub supported_tasks: Vec<TaskType>,

    /// Lowest confidence the backend can plausibly report.
    pub min_confidence: f64,

    /// Highest confidence the backend can plausibly report. Doubles as the
    /// backend's declared quality when ranking candidates.
    pub max_confidence: f64,

    /// Maximum input size in tokens.
    pub max_tokens: u32,

    /// Average latency of one invocation, in milliseconds.
    pub average_latency_ms: u64,
}

impl ModelCapabilities {
    /// Create capabilities with a full confidence range and no task support.
    pub fn new(backend: BackendId) -> Self {
        Self {
            backend,
            supported_tasks: Vec::new(),
            min_confidence: 0.0,
            max_confidence: 1.0,
            max_tokens: 4096,
            average_latency_ms: 1_000,
        }
    }

    /// Builder method to declare supported task types.
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskType>) -> Self {
        for task in tasks {
            if !self.supported_tasks.contains(&task) {
                self.supported_tasks.push(task);
            }
        }
        self
    }

    /// Builder method to set the plausible confidence range.
    pub fn with_confidence_range(mut self, min: f64, max: f64) -> Self {
        self.min_confidence = min;
        self.max_confidence = max;
        self
    }

    /// Builder method to set the maximum input size.
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Builder method to set the average latency.
    pub fn with_average_latency_ms(mut self, ms: u64) -> Self {
        self.average_latency_ms = ms;
        self
    }

    /// Check if this backend accepts the given task type.
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.supported_tasks.contains(&task_type)
    }

    /// Check the declared range is well-formed: `0 <= min <= max <= 1`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.min_confidence)
            || !in_unit(self.max_confidence)
            || self.min_confidence > self.max_confidence
        {
            return Err(CoreError::InvalidInput(format!(
                "backend {}: confidence range [{}, {}] is not within [0, 1]",
                self.backend, self.min_confidence, self.max_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("DeepSeek".parse::<BackendId>().unwrap(), BackendId::DeepSeek);
        assert_eq!(" phi ".parse::<BackendId>().unwrap(), BackendId::Phi);
        assert!("llama".parse::<BackendId>().is_err());
    }

    #[test]
    fn test_with_tasks_deduplicates() {
        let caps = ModelCapabilities::new(BackendId::Huginn)
            .with_tasks([TaskType::Generation, TaskType::Generation, TaskType::Debugging]);
        assert_eq!(caps.supported_tasks.len(), 2);
        assert!(caps.supports(TaskType::Debugging));
        assert!(!caps.supports(TaskType::Documentation));
    }

    #[test]
    fn test_validate_confidence_range() {
        let ok = ModelCapabilities::new(BackendId::Phi).with_confidence_range(0.2, 0.9);
        assert!(ok.validate().is_ok());

        let inverted = ModelCapabilities::new(BackendId::Phi).with_confidence_range(0.9, 0.2);
        assert!(inverted.validate().is_err());

        let out_of_range = ModelCapabilities::new(BackendId::Phi).with_confidence_range(0.0, 1.5);
        assert!(out_of_range.validate().is_err());
    }
}
