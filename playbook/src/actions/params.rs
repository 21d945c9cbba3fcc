//! Typed access to resolved step parameters.

use crate::core::value::{as_bool, as_usize};
use crate::errors::ActionError;
use serde_json::{Map, Value};

/// A view over an action's parameters that produces action-specific errors.
///
/// Templates often resolve to strings, so numeric and boolean accessors
/// accept `"25"` and `"true"`. Null and empty-string values count as absent.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    action: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    /// Wraps `map` for the named action.
    #[must_use]
    pub fn new(action: &'a str, map: &'a Map<String, Value>) -> Self {
        Self { action, map }
    }

    /// Returns the value of `key` unless it is absent, null or `""`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
    }

    /// Returns the value of `key` or a missing-parameter error.
    ///
    /// # Errors
    ///
    /// `MissingParam` when the key is absent.
    pub fn required(&self, key: &str) -> Result<&'a Value, ActionError> {
        self.get(key)
            .ok_or_else(|| ActionError::missing(self.action, key))
    }

    /// Returns `key` as a string if it is one.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns `key` as a string.
    ///
    /// # Errors
    ///
    /// `MissingParam` when absent, `InvalidParam` when not a string.
    pub fn required_str(&self, key: &str) -> Result<&'a str, ActionError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| ActionError::invalid(self.action, key, "expected a string"))
    }

    /// Returns `key` as a non-negative integer, if present.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when present but not a non-negative integer.
    pub fn opt_usize(&self, key: &str) -> Result<Option<usize>, ActionError> {
        self.get(key)
            .map(|v| {
                as_usize(v).ok_or_else(|| {
                    ActionError::invalid(self.action, key, format!("expected a non-negative integer, got {v}"))
                })
            })
            .transpose()
    }

    /// Returns `key` as a non-negative integer, or `default` when absent.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when present but not a non-negative integer.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ActionError> {
        Ok(self.opt_usize(key)?.unwrap_or(default))
    }

    /// Returns `key` as a boolean, or `default` when absent or unreadable.
    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(as_bool).unwrap_or(default)
    }

    /// Returns `key` as an object.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when present but not an object.
    pub fn object(&self, key: &str) -> Result<Option<&'a Map<String, Value>>, ActionError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ActionError::invalid(self.action, key, "expected an object")),
        }
    }

    /// The action these parameters belong to.
    #[must_use]
    pub fn action(&self) -> &'a str {
        self.action
    }
}
