//! Action trait and the name-to-handler registry.

use super::clients::ExternalClients;
use crate::context::RunContext;
use crate::errors::ActionError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A step handler.
///
/// Handlers receive parameters with templates already resolved and may
/// mutate the run context. They run one at a time.
#[async_trait]
pub trait Action: Send + Sync {
    /// The name steps use to invoke this action.
    fn name(&self) -> &str;

    /// Runs the action.
    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError>;
}

/// Maps action names to handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in action and default external
    /// clients.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::with_clients(ExternalClients::default())
    }

    /// Creates a registry with every built-in action, backing the external
    /// ones with `clients`.
    #[must_use]
    pub fn with_clients(clients: ExternalClients) -> Self {
        let mut registry = Self::new();
        super::builtin::register(&mut registry);
        super::transform::register(&mut registry);
        super::external::register(&mut registry, &clients);
        registry
    }

    /// Registers an action, replacing any action with the same name.
    pub fn register(&mut self, action: impl Action + 'static) {
        self.register_arc(Arc::new(action));
    }

    /// Registers a shared action.
    pub fn register_arc(&mut self, action: Arc<dyn Action>) {
        let name = action.name().to_string();
        if self.actions.insert(name.clone(), action).is_some() {
            debug!(action = %name, "Replaced registered action");
        }
    }

    /// Returns the named action.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(name)
    }

    /// Returns true if an action is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs the named action.
    ///
    /// # Errors
    ///
    /// `UnknownAction` when nothing is registered under `name`, otherwise
    /// whatever the handler returns.
    pub async fn dispatch(
        &self,
        name: &str,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        action.execute(params, ctx).await
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
