//! # Playbook
//!
//! A declarative step-pipeline engine for data collection jobs.
//!
//! A playbook is a YAML (or JSON) document listing named steps. Each step
//! invokes a registered action with templated parameters:
//!
//! - **Templates**: `${env.X}`, `${config.a.b}`, `${vars.page.rows}`,
//!   `${collections.leads.length}` and `a || b || 'default'` fallback chains
//! - **Conditions**: `when` guards with truthiness, negation, `.length`
//!   comparisons and one level of `&&` / `||`
//! - **Stores**: named collections, batch buffers and deduplication
//! - **Policy**: `register`, `track_result` and `ignore_errors` per step
//! - **Progress**: periodic snapshots and advisory store compaction
//! - **Cancellation**: a token checked between steps and inside delays
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use playbook::prelude::*;
//!
//! let registry = ActionRegistry::with_builtins();
//! let mut runner = PipelineRunner::new(registry)
//!     .with_config(EngineConfig::from_env());
//!
//! let env = std::env::vars().collect();
//! let summary = runner.run_file("playbooks/florists.yaml", env).await?;
//! println!("{summary}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod cancellation;
pub mod condition;
pub mod config;
pub mod context;
pub mod core;
pub mod document;
pub mod errors;
pub mod events;
pub mod progress;
pub mod runner;
pub mod store;
pub mod template;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{Action, ActionRegistry, ExternalClients, Params};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::EngineConfig;
    pub use crate::context::{RunContext, ThrottleSpec};
    pub use crate::core::{RunState, StepStatus};
    pub use crate::document::{Playbook, Step, WhenClause};
    pub use crate::errors::{ActionError, LoadError, PlaybookError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::progress::{load_progress, MemoryStats, ProgressSnapshot};
    pub use crate::runner::{PipelineRunner, RunSummary};
}
