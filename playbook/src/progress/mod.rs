//! Progress checkpoints and resource telemetry.
//!
//! The runner asks the [`CheckpointManager`] after every step whether a
//! snapshot is due, and the [`ResourceMonitor`] whether the stores should
//! be compacted. Neither is required for a run to succeed.

mod checkpoint;
mod memory;

pub use checkpoint::{
    load_progress, CheckpointManager, ProgressSnapshot, DEFAULT_CHECKPOINT_EVERY,
    DEFAULT_PROGRESS_FILE,
};
pub use memory::{
    MemoryStats, ResourceMonitor, DEFAULT_COMPACT_INTERVAL, DEFAULT_TELEMETRY_EVERY,
};
