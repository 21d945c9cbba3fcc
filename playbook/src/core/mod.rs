//! Core domain types shared by every engine component.
//!
//! This module contains:
//! - Run state and step status enums
//! - JSON value helpers (path lookup, truthiness, rendering)

mod status;
pub mod value;

pub use status::{RunState, StepStatus};
