//! `${...}` template resolution.
//!
//! Step parameters and configuration values may embed placeholders:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `${env.VAR}` | Environment snapshot taken at run start |
//! | `${config.a.b}` | Resolved playbook configuration |
//! | `${vars.a.b}` | Run-scoped variables (`register` targets) |
//! | `${collections.name.length}` | Named collections |
//! | `${a \|\| b \|\| 'literal'}` | First truthy alternative |
//! | `${now}`, `${today}`, `${uuid}`, `${timestamp_ms}` | Dynamic values |
//!
//! Resolution never fails. Unparseable or unrecognised expressions are left
//! in the output verbatim so that a typo is visible downstream.

mod dynamic;
mod parser;
mod resolver;

pub use dynamic::DynamicToken;
pub use parser::{Alternative, Expr, Namespace, Segment, Template, VarPath};
pub use resolver::{lookup_env, resolve, resolve_params, resolve_str, EnvScope, Scope};
