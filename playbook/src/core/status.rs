//! Run state and step status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a pipeline run.
///
/// Transitions are `Idle -> Loading -> Running(i) -> Completed | Failed`.
/// A malformed document goes straight from `Loading` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run has started yet.
    #[default]
    Idle,
    /// The playbook document is being read and validated.
    Loading,
    /// Executing the step at the given zero-based index.
    Running(usize),
    /// Every step was processed.
    Completed,
    /// The run stopped on a load error, a step failure or a cancellation.
    Failed,
}

impl RunState {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Running(index) => write!(f, "running({index})"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The outcome of processing a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The handler ran and its result was registered.
    Completed,
    /// The step was skipped (shape defect or `when` evaluated to false).
    Skipped,
    /// The handler failed but the step had `ignore_errors` set.
    FailedIgnored,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::FailedIgnored => write!(f, "failed_ignored"),
        }
    }
}
