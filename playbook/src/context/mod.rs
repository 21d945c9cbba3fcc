//! Run context: variables, stores and per-run rate limits.

mod run_context;
mod throttle;

pub use run_context::RunContext;
pub use throttle::{ThrottleRegistry, ThrottleSpec, DEFAULT_BURST};
