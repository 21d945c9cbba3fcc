//! Test assertions for run outcomes.

use crate::errors::PlaybookError;
use crate::events::CollectingEventSink;
use crate::runner::RunSummary;

/// Asserts that the run failed on the named step.
pub fn assert_step_failed<T: std::fmt::Debug>(result: &Result<T, PlaybookError>, step: &str) {
    match result {
        Err(err) => assert_eq!(
            err.step_name(),
            Some(step),
            "Expected step '{step}' to fail, got: {err}"
        ),
        Ok(value) => panic!("Expected step '{step}' to fail, run succeeded with {value:?}"),
    }
}

/// Asserts the completed, skipped and ignored-failure counts of a run.
pub fn assert_step_counts(summary: &RunSummary, completed: usize, skipped: usize, ignored: usize) {
    assert_eq!(
        (
            summary.steps_completed,
            summary.steps_skipped,
            summary.steps_failed_ignored
        ),
        (completed, skipped, ignored),
        "Expected (completed, skipped, ignored) = ({completed}, {skipped}, {ignored})"
    );
}

/// Asserts that the sink saw exactly these event names, in order.
pub fn assert_event_sequence(sink: &CollectingEventSink, expected: &[&str]) {
    let actual = sink.types();
    assert_eq!(actual, expected, "Unexpected event sequence");
}
