//! Testing utilities for playbook runs.
//!
//! This module provides:
//! - Mock actions (fixed value, failing, slow, recording)
//! - Assertions over run results and event streams

mod assertions;
mod mocks;

pub use assertions::{assert_event_sequence, assert_step_counts, assert_step_failed};
pub use mocks::{FailingAction, RecordingAction, SlowAction, StaticAction};
