//! Run lifecycle events.
//!
//! The runner reports its progress through an [`EventSink`] handed to it at
//! construction. There is no global sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event names emitted by the runner.
pub mod kinds {
    /// A run has loaded its playbook and is about to execute steps.
    pub const RUN_STARTED: &str = "run.started";
    /// A run processed every step.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// A run stopped early.
    pub const RUN_FAILED: &str = "run.failed";
    /// A step's action is about to be dispatched.
    pub const STEP_STARTED: &str = "step.started";
    /// A step was skipped.
    pub const STEP_SKIPPED: &str = "step.skipped";
    /// A step's action succeeded.
    pub const STEP_COMPLETED: &str = "step.completed";
    /// A step's action failed.
    pub const STEP_FAILED: &str = "step.failed";
}
