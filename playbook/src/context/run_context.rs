//! The mutable state of one pipeline run.

use super::throttle::ThrottleRegistry;
use crate::cancellation::CancellationToken;
use crate::condition;
use crate::core::value::lookup_in_map;
use crate::store::{BufferStore, CollectionStore};
use crate::template::{self, lookup_env, Namespace, Scope, VarPath};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a run reads and writes between steps.
///
/// The runner owns the context for the lifetime of a run and lends it
/// mutably to one action at a time. Nothing here is shared between runs.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    /// Environment snapshot taken when the run started.
    pub environment: HashMap<String, String>,
    /// Playbook configuration, already resolved against the environment.
    pub config: Map<String, Value>,
    /// Run-scoped variables written by `register` and `set_variable`.
    pub vars: Map<String, Value>,
    /// Named collections.
    pub collections: CollectionStore,
    /// Named batch buffers.
    pub buffers: BufferStore,
    /// Step results recorded by `track_result`.
    pub results: Map<String, Value>,
    /// Rate limiters for throttled actions.
    pub throttles: ThrottleRegistry,
    records_processed: u64,
    cancellation: Arc<CancellationToken>,
}

impl RunContext {
    /// Creates a context with a fresh run id and empty stores.
    #[must_use]
    pub fn new(environment: HashMap<String, String>, config: Map<String, Value>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            environment,
            config,
            vars: Map::new(),
            collections: CollectionStore::new(),
            buffers: BufferStore::new(),
            results: Map::new(),
            throttles: ThrottleRegistry::new(),
            records_processed: 0,
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Adds to the count of records fetched from external sources.
    pub fn record_processed(&mut self, count: usize) {
        self.records_processed += count as u64;
    }

    /// Records fetched from external sources so far.
    #[must_use]
    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    /// Resolves templates in `value` against this context.
    #[must_use]
    pub fn resolve(&self, value: &Value) -> Value {
        template::resolve(value, self)
    }

    /// Resolves templates in every parameter.
    #[must_use]
    pub fn resolve_params(&self, params: &Map<String, Value>) -> Map<String, Value> {
        template::resolve_params(params, self)
    }

    /// Evaluates a `when` expression against this context.
    #[must_use]
    pub fn evaluate_condition(&self, condition: Option<&str>) -> bool {
        condition::evaluate(condition, self)
    }

    /// Looks up a bare reference such as `collections.leads` or
    /// `vars.page.rows`. Returns `None` if the text is not a path or the
    /// path is undefined.
    #[must_use]
    pub fn lookup_reference(&self, reference: &str) -> Option<Value> {
        let path = VarPath::parse(reference).ok()?;
        self.lookup(&path)
    }

    /// Records held in buffers and collections.
    #[must_use]
    pub fn stored_items(&self) -> (usize, usize) {
        (self.buffers.total_items(), self.collections.total_items())
    }

    /// Returns spare store capacity to the allocator.
    pub fn shrink_to_fit(&mut self) {
        self.collections.shrink_to_fit();
        self.buffers.shrink_to_fit();
    }

    /// Drops every collection and buffer.
    pub fn cleanup(&mut self) {
        self.collections.clear();
        self.buffers.clear();
        self.shrink_to_fit();
    }
}

impl Scope for RunContext {
    fn lookup(&self, path: &VarPath) -> Option<Value> {
        match path.namespace {
            Namespace::Env => lookup_env(&self.environment, &path.segments),
            Namespace::Config => lookup_in_map(&self.config, &path.segments),
            Namespace::Vars => lookup_in_map(&self.vars, &path.segments),
            Namespace::Collections => self.collections.lookup(&path.segments),
            Namespace::Item => None,
        }
    }

    fn provides(&self, namespace: Namespace) -> bool {
        namespace != Namespace::Item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context() -> RunContext {
        let mut env = HashMap::new();
        env.insert("REGION".to_string(), "eu-west".to_string());
        let config = json!({"api": {"base": "https://api.example.com"}});
        RunContext::new(env, config.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_lookup_each_namespace() {
        let mut ctx = context();
        ctx.vars.insert("page".into(), json!({"rows": [1, 2, 3]}));
        ctx.collections.set("leads", vec![json!({"id": 1})]);

        assert_eq!(ctx.resolve(&json!("${env.REGION}")), json!("eu-west"));
        assert_eq!(ctx.resolve(&json!("${config.api.base}/v1")), json!("https://api.example.com/v1"));
        assert_eq!(ctx.resolve(&json!("${vars.page.rows.length}")), json!(3));
        assert_eq!(ctx.resolve(&json!("${collections.leads.0.id}")), json!(1));
        assert_eq!(ctx.resolve(&json!("${item.id}")), json!("${item.id}"));
    }

    #[test]
    fn test_evaluate_condition_against_collections() {
        let mut ctx = context();
        assert!(!ctx.evaluate_condition(Some("collections.leads.length > 0")));
        ctx.collections.set("leads", vec![json!(1)]);
        assert!(ctx.evaluate_condition(Some("collections.leads.length > 0")));
        assert!(ctx.evaluate_condition(None));
    }

    #[test]
    fn test_lookup_reference() {
        let mut ctx = context();
        ctx.collections.set("leads", vec![json!(1), json!(2)]);
        assert_eq!(ctx.lookup_reference("collections.leads"), Some(json!([1, 2])));
        assert_eq!(ctx.lookup_reference("not a path"), None);
    }

    #[test]
    fn test_cleanup_empties_stores() {
        let mut ctx = context();
        ctx.collections.set("a", vec![json!(1)]);
        ctx.buffers.append("b", json!([1, 2]), 5).unwrap();
        assert_eq!(ctx.stored_items(), (2, 1));

        ctx.cleanup();
        assert!(ctx.collections.is_empty());
        assert!(ctx.buffers.is_empty());
    }

    #[test]
    fn test_shared_cancellation() {
        let token = Arc::new(CancellationToken::new());
        let ctx = context().with_cancellation(Arc::clone(&token));
        token.cancel("stop");
        assert!(ctx.is_cancelled());
    }
}
