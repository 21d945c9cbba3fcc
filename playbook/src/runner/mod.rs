//! Playbook execution.
//!
//! The [`PipelineRunner`] walks a playbook's steps in order: it checks each
//! step's guard, resolves its parameters, dispatches its action, records the
//! result and asks the checkpoint manager whether progress is due. Stores
//! are cleaned up on every exit path.

mod pipeline;
mod summary;

pub use pipeline::PipelineRunner;
pub use summary::RunSummary;
