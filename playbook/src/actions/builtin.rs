//! Core built-in actions: logging, variables, collections, buffers, delays.

use super::params::Params;
use super::registry::{Action, ActionRegistry};
use crate::context::RunContext;
use crate::errors::ActionError;
use crate::store::{dedup, DEFAULT_BATCH_SIZE};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub(super) fn register(registry: &mut ActionRegistry) {
    registry.register(LogAction);
    registry.register(SetCollectionAction);
    registry.register(BufferCollectionAction);
    registry.register(FlushBufferAction);
    registry.register(DedupCollectionAction);
    registry.register(ReleaseCollectionAction);
    registry.register(SetVariableAction);
    registry.register(DelayAction::delay());
    registry.register(DelayAction::sleep());
}

/// Resolves a `source` parameter.
///
/// A string naming a path (`collections.leads`, `vars.page.rows`) is looked
/// up in the context; anything else is used as given.
pub(super) fn resolve_source<'a>(value: &'a Value, ctx: &RunContext) -> Cow<'a, Value> {
    match value {
        Value::String(reference) => ctx
            .lookup_reference(reference)
            .map_or(Cow::Borrowed(value), Cow::Owned),
        other => Cow::Borrowed(other),
    }
}

/// Returns the collection name of a `collections.<name>` reference.
fn collection_reference(value: &Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("collections."))
        .filter(|name| !name.is_empty() && !name.contains('.'))
}

/// `log {message, level = info}`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let message = match params.get("message") {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };

        match p.str("level").unwrap_or("info") {
            "debug" => debug!("{message}"),
            "warn" | "warning" => warn!("{message}"),
            "error" => error!("{message}"),
            _ => info!("{message}"),
        }

        Ok(json!({ "logged": true, "message": message }))
    }
}

/// `set_collection {name, data}`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCollectionAction;

#[async_trait]
impl Action for SetCollectionAction {
    fn name(&self) -> &str {
        "set_collection"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let name = p.required_str("name")?;

        let items = match params.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                warn!(collection = %name, "Collection data is not an array, storing an empty collection");
                Vec::new()
            }
        };

        let count = ctx.collections.set(name, items);
        info!(collection = %name, count, "Stored collection");
        Ok(json!({ "collection": name, "count": count }))
    }
}

/// `buffer_collection {buffer_name, data, batch_size = 25}`
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferCollectionAction;

#[async_trait]
impl Action for BufferCollectionAction {
    fn name(&self) -> &str {
        "buffer_collection"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let buffer = p.required_str("buffer_name")?;
        let batch_size = p.usize_or("batch_size", DEFAULT_BATCH_SIZE)?;
        let data = params.get("data").cloned().unwrap_or(Value::Null);

        let outcome = ctx.buffers.append(buffer, data, batch_size)?;
        info!(
            buffer = %buffer,
            buffered = outcome.buffered,
            total = outcome.total,
            "Buffered records"
        );

        Ok(json!({
            "buffer": buffer,
            "buffered_count": outcome.buffered,
            "total_count": outcome.total,
            "batch_size": outcome.batch_size,
        }))
    }
}

/// `flush_buffer {buffer_name, batch_size?, all = false}`
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushBufferAction;

#[async_trait]
impl Action for FlushBufferAction {
    fn name(&self) -> &str {
        "flush_buffer"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let buffer = p.required_str("buffer_name")?;
        let batch_size = p.opt_usize("batch_size")?;
        let all = p.bool_or("all", false);

        let Some(outcome) = ctx.buffers.flush(buffer, batch_size, all)? else {
            warn!(buffer = %buffer, "Buffer not found, nothing to flush");
            return Ok(json!({
                "buffer": buffer,
                "batches": [],
                "batch_count": 0,
                "flushed_count": 0,
                "remaining": 0,
                "batches_flushed": 0,
            }));
        };

        info!(
            buffer = %buffer,
            batches = outcome.batches.len(),
            flushed = outcome.flushed_count,
            remaining = outcome.remaining,
            "Flushed buffer"
        );

        Ok(json!({
            "buffer": buffer,
            "batch_count": outcome.batches.len(),
            "batches": outcome.batches,
            "flushed_count": outcome.flushed_count,
            "remaining": outcome.remaining,
            "batches_flushed": outcome.batches_flushed,
        }))
    }
}

/// `dedup_collection {source, key?, release = false}`
///
/// The source is left untouched unless `release` is set and the source is
/// a `collections.<name>` reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupCollectionAction;

#[async_trait]
impl Action for DedupCollectionAction {
    fn name(&self) -> &str {
        "dedup_collection"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let raw_source = p.required("source")?;
        let key = p.str("key");

        let deduped = match resolve_source(raw_source, ctx).as_ref() {
            Value::Array(records) => {
                let out = dedup(records, key);
                info!(
                    before = records.len(),
                    after = out.len(),
                    removed = records.len() - out.len(),
                    "Deduplicated records"
                );
                out
            }
            _ => {
                warn!("Dedup source is not an array");
                Vec::new()
            }
        };

        if p.bool_or("release", false) {
            match collection_reference(raw_source) {
                Some(name) => {
                    ctx.collections.release(name);
                    debug!(collection = %name, "Released dedup source");
                }
                None => warn!("release requested but source is not a collection reference"),
            }
        }

        Ok(Value::Array(deduped))
    }
}

/// `release_collection {name}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseCollectionAction;

#[async_trait]
impl Action for ReleaseCollectionAction {
    fn name(&self) -> &str {
        "release_collection"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let name = p.required_str("name")?;

        let released = ctx.collections.release(name);
        let count = released.as_ref().map_or(0, Vec::len);
        info!(collection = %name, count, "Released collection");

        Ok(json!({
            "collection": name,
            "released": released.is_some(),
            "count": count,
        }))
    }
}

/// `set_variable {name, value}`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetVariableAction;

#[async_trait]
impl Action for SetVariableAction {
    fn name(&self) -> &str {
        "set_variable"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let name = p.required_str("name")?;
        let value = params.get("value").cloned().unwrap_or(Value::Null);

        debug!(variable = %name, value = %value, "Set variable");
        ctx.vars.insert(name.to_string(), value.clone());
        Ok(json!({ "variable": name, "value": value }))
    }
}

/// `delay {milliseconds = 1000}` and its alias `sleep {duration = 1000}`.
///
/// Returns early with a cancellation error if the run is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct DelayAction {
    name: &'static str,
    param: &'static str,
}

impl DelayAction {
    const DEFAULT_MS: usize = 1000;

    /// The `delay` action.
    #[must_use]
    pub const fn delay() -> Self {
        Self {
            name: "delay",
            param: "milliseconds",
        }
    }

    /// The `sleep` action.
    #[must_use]
    pub const fn sleep() -> Self {
        Self {
            name: "sleep",
            param: "duration",
        }
    }
}

#[async_trait]
impl Action for DelayAction {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name, params);
        let millis = p.usize_or(self.param, Self::DEFAULT_MS)?;
        let token = Arc::clone(ctx.cancellation());

        info!(milliseconds = millis, "Waiting");
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(millis as u64)) => {}
            () = token.cancelled() => {
                return Err(ActionError::Cancelled(
                    token.reason().unwrap_or_else(|| "run cancelled".to_string()),
                ));
            }
        }

        let mut out = Map::new();
        out.insert("delayed".to_string(), Value::Bool(true));
        out.insert(self.param.to_string(), Value::from(millis));
        Ok(Value::Object(out))
    }
}
