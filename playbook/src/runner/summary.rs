//! The value returned by a successful run.

use crate::core::StepStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Counts and results of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The playbook's display name.
    pub playbook: String,
    /// The run id.
    pub run_id: Uuid,
    /// Steps whose action succeeded.
    pub steps_completed: usize,
    /// Steps skipped by shape or `when`.
    pub steps_skipped: usize,
    /// Steps that failed under `ignore_errors`.
    pub steps_failed_ignored: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Progress snapshots written.
    pub checkpoints_written: usize,
    /// Records fetched from external sources.
    pub records_processed: u64,
    /// Results of steps with `track_result`, keyed by step name.
    pub results: Map<String, Value>,
}

impl RunSummary {
    /// Creates an empty summary for a run.
    #[must_use]
    pub fn new(playbook: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            playbook: playbook.into(),
            run_id,
            steps_completed: 0,
            steps_skipped: 0,
            steps_failed_ignored: 0,
            elapsed: Duration::ZERO,
            checkpoints_written: 0,
            records_processed: 0,
            results: Map::new(),
        }
    }

    /// Counts one processed step.
    pub fn record(&mut self, status: StepStatus) {
        match status {
            StepStatus::Completed => self.steps_completed += 1,
            StepStatus::Skipped => self.steps_skipped += 1,
            StepStatus::FailedIgnored => self.steps_failed_ignored += 1,
        }
    }

    /// Steps processed in any way.
    #[must_use]
    pub fn steps_processed(&self) -> usize {
        self.steps_completed + self.steps_skipped + self.steps_failed_ignored
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} completed, {} skipped, {} failed (ignored) in {:.1}s",
            self.playbook,
            self.steps_completed,
            self.steps_skipped,
            self.steps_failed_ignored,
            self.elapsed.as_secs_f64()
        )?;
        if self.records_processed > 0 {
            write!(f, ", {} records", self.records_processed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_display() {
        let mut summary = RunSummary::new("demo", Uuid::nil());
        summary.record(StepStatus::Completed);
        summary.record(StepStatus::Completed);
        summary.record(StepStatus::Skipped);
        summary.record(StepStatus::FailedIgnored);
        summary.elapsed = Duration::from_millis(1500);

        assert_eq!(summary.steps_processed(), 4);
        assert_eq!(
            summary.to_string(),
            "demo: 2 completed, 1 skipped, 1 failed (ignored) in 1.5s"
        );
    }
}
