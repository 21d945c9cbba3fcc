//! Playbook document model.

use crate::context::RunContext;
use crate::core::value::is_truthy;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A parsed playbook: optional metadata, a config section and the steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Configuration exposed under `config.`; string values may reference
    /// the environment.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Playbook {
    /// Name to show in logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}

/// One step of a playbook.
///
/// `name` and `action` are optional at parse time so that a step missing
/// either is skipped with a warning instead of rejecting the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name; also the key under `results` when `track_result` is set.
    #[serde(default)]
    pub name: Option<String>,
    /// Registered action to dispatch.
    #[serde(default)]
    pub action: Option<String>,
    /// Action parameters, resolved against the context before dispatch.
    /// `params: null` reads as no parameters.
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Map<String, Value>,
    /// Guard condition.
    #[serde(default)]
    pub when: Option<WhenClause>,
    /// Variable to store the action result under.
    #[serde(default)]
    pub register: Option<String>,
    /// Record the result under `results.<name>`.
    #[serde(default, deserialize_with = "loose_bool")]
    pub track_result: bool,
    /// Continue the run if the action fails.
    #[serde(default, deserialize_with = "loose_bool")]
    pub ignore_errors: bool,
}

impl Step {
    /// Creates a step invoking `action`.
    #[must_use]
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Sets a `when` expression.
    #[must_use]
    pub fn with_when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(WhenClause::Expr(condition.into()));
        self
    }

    /// Sets the `register` target.
    #[must_use]
    pub fn with_register(mut self, var: impl Into<String>) -> Self {
        self.register = Some(var.into());
        self
    }

    /// Enables `track_result`.
    #[must_use]
    pub fn tracked(mut self) -> Self {
        self.track_result = true;
        self
    }

    /// Enables `ignore_errors`.
    #[must_use]
    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    /// Returns the name and action if both are present and non-empty.
    #[must_use]
    pub fn runnable(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().filter(|n| !n.trim().is_empty())?;
        let action = self.action.as_deref().filter(|a| !a.trim().is_empty())?;
        Some((name, action))
    }

    /// Evaluates the step's guard. A step without one always runs.
    #[must_use]
    pub fn should_run(&self, ctx: &RunContext) -> bool {
        match &self.when {
            None => true,
            Some(WhenClause::Literal(flag)) => *flag,
            Some(WhenClause::Expr(text)) => ctx.evaluate_condition(Some(text)),
        }
    }
}

fn params_or_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(D::Error::custom(format!(
            "params must be a mapping, got {other}"
        ))),
    }
}

/// Reads a step flag. Booleans pass through, the usual spellings of
/// true and false are honoured, and anything else goes by truthiness.
fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if let Value::String(text) = &value {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => return Ok(true),
            "false" | "no" | "off" | "0" | "" => return Ok(false),
            _ => {}
        }
    }
    Ok(is_truthy(&value))
}

/// A `when` value: an expression, or a literal boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenClause {
    /// A literal `true` or `false`.
    Literal(bool),
    /// A condition expression.
    Expr(String),
}
