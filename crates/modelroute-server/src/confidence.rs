//! Confidence evaluation.

use std::fmt;
use std::str::FromStr;

use modelroute_core::{clamp_unit, ModelCapabilities, Task, TaskResult};

/// How the router treats a successful result below the task threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Below-threshold results trigger fallback.
    #[default]
    Hard,
    /// Below-threshold results are accepted with a warning.
    Advisory,
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Advisory => write!(f, "advisory"),
        }
    }
}

impl FromStr for ThresholdMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "advisory" | "soft" => Ok(Self::Advisory),
            other => Err(format!("unknown threshold mode '{other}'")),
        }
    }
}

/// Judges whether a result meets a task's quality bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceEvaluator {
    mode: ThresholdMode,
}

impl ConfidenceEvaluator {
    pub fn new(mode: ThresholdMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// The hard gate: a successful result at or above the task's threshold.
    pub fn passes(&self, task: &Task, result: &TaskResult) -> bool {
        result.success && result.confidence_score >= task.confidence_threshold
    }

    /// Whether the router should accept the result, honouring the mode.
    pub fn accepts(&self, task: &Task, result: &TaskResult) -> bool {
        match self.mode {
            ThresholdMode::Hard => self.passes(task, result),
            ThresholdMode::Advisory => result.success,
        }
    }

    /// Bound a self-reported score by the backend's declared range.
    pub fn clamp(&self, score: f64, caps: &ModelCapabilities) -> f64 {
        let lo = clamp_unit(caps.min_confidence);
        let hi = clamp_unit(caps.max_confidence).max(lo);
        clamp_unit(score).clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::{BackendId, Context, TaskType};

    fn caps(min: f64, max: f64) -> ModelCapabilities {
        ModelCapabilities::new(BackendId::Huginn).with_confidence_range(min, max)
    }

    fn task(threshold: f64) -> Task {
        Task::new(TaskType::Generation, "x").with_threshold(threshold)
    }

    fn result(success: bool, score: f64) -> TaskResult {
        let ok = TaskResult::completed("t".into(), "out", score, BackendId::DeepSeek, Context::default());
        if success {
            ok
        } else {
            TaskResult::failed("t".into(), "boom", Context::default())
                .with_last_attempt(Some(BackendId::DeepSeek), score)
        }
    }

    #[test]
    fn test_passes_requires_success_and_threshold() {
        let eval = ConfidenceEvaluator::default();
        assert!(eval.passes(&task(0.8), &result(true, 0.8)));
        assert!(eval.passes(&task(0.8), &result(true, 0.85)));
        assert!(!eval.passes(&task(0.8), &result(true, 0.79)));
        assert!(!eval.passes(&task(0.1), &result(false, 0.99)));
        // Hard mode accepts exactly what passes.
        assert!(eval.accepts(&task(0.8), &result(true, 0.85)));
        assert!(!eval.accepts(&task(0.8), &result(true, 0.79)));
    }

    #[test]
    fn test_clamp_bounds_to_declared_range() {
        let eval = ConfidenceEvaluator::default();
        let c = caps(0.2, 0.6);
        assert_eq!(eval.clamp(0.95, &c), 0.6);
        assert_eq!(eval.clamp(0.05, &c), 0.2);
        assert_eq!(eval.clamp(0.4, &c), 0.4);
        assert_eq!(eval.clamp(f64::NAN, &c), 0.2);
    }

    #[test]
    fn test_passes_is_monotonic_in_threshold() {
        let eval = ConfidenceEvaluator::default();
        let thresholds: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();

        for score in [0.0, 0.33, 0.5, 0.71, 1.0] {
            for success in [true, false] {
                let candidate = result(success, score);
                let verdicts: Vec<bool> = thresholds
                    .iter()
                    .map(|t| eval.passes(&task(*t), &candidate))
                    .collect();
                // Once failing, raising the threshold never passes again.
                let first_fail = verdicts.iter().position(|v| !v).unwrap_or(verdicts.len());
                assert!(verdicts[first_fail..].iter().all(|v| !v));
            }
        }
    }

    #[test]
    fn test_advisory_accepts_low_confidence_success() {
        let eval = ConfidenceEvaluator::new(ThresholdMode::Advisory);
        assert!(eval.accepts(&task(0.9), &result(true, 0.1)));
        assert!(!eval.accepts(&task(0.1), &result(false, 0.9)));
        // passes stays the hard contract.
        assert!(!eval.passes(&task(0.9), &result(true, 0.1)));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("hard".parse::<ThresholdMode>().unwrap(), ThresholdMode::Hard);
        assert_eq!("Advisory".parse::<ThresholdMode>().unwrap(), ThresholdMode::Advisory);
        assert!("maybe".parse::<ThresholdMode>().is_err());
    }
}
