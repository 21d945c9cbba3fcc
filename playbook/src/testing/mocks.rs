//! Mock actions for testing runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::actions::Action;
use crate::context::RunContext;
use crate::errors::ActionError;

/// An action that returns a fixed value.
#[derive(Debug, Clone)]
pub struct StaticAction {
    name: String,
    value: Value,
}

impl StaticAction {
    /// Creates an action returning `value`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl Action for StaticAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        Ok(self.value.clone())
    }
}

/// An action that always fails with a handler error.
#[derive(Debug, Clone)]
pub struct FailingAction {
    name: String,
    error: String,
}

impl FailingAction {
    /// Creates a failing action.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        Err(ActionError::handler(self.error.clone()))
    }
}

/// An action that waits before returning `null`.
#[derive(Debug, Clone)]
pub struct SlowAction {
    name: String,
    delay: Duration,
}

impl SlowAction {
    /// Creates a slow action.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow action with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Action for SlowAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::Null)
    }
}

/// An action that records the resolved parameters of every call and echoes
/// them back.
#[derive(Debug)]
pub struct RecordingAction {
    name: String,
    calls: Mutex<Vec<Map<String, Value>>>,
}

impl RecordingAction {
    /// Creates a recording action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Parameters of every call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Map<String, Value>> {
        self.calls.lock().clone()
    }

    /// Number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        self.calls.lock().push(params.clone());
        Ok(Value::Object(params.clone()))
    }
}
