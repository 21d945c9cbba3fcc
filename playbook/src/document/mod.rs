//! Playbook documents: the step list and its configuration.

mod loader;
mod playbook;

pub use loader::Format;
pub use playbook::{Playbook, Step, WhenClause};
