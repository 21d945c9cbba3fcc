//! Record-shaping actions: `filter_collection` and `transform_data`.

use super::builtin::resolve_source;
use super::params::Params;
use super::registry::{Action, ActionRegistry};
use crate::context::RunContext;
use crate::core::value::{is_truthy, lookup_path, render};
use crate::errors::ActionError;
use crate::template::{self, Namespace, Scope, VarPath};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

pub(super) fn register(registry: &mut ActionRegistry) {
    registry.register(FilterCollectionAction);
    registry.register(TransformDataAction);
}

/// Exposes one record under `item.` on top of the run context.
struct ItemScope<'a> {
    item: &'a Value,
    ctx: &'a RunContext,
}

impl Scope for ItemScope<'_> {
    fn lookup(&self, path: &VarPath) -> Option<Value> {
        match path.namespace {
            Namespace::Item => lookup_path(self.item, &path.segments),
            _ => self.ctx.lookup(path),
        }
    }
}

/// `filter_collection {source, filter}`
///
/// Keeps records where every filter field matches: an array filter value
/// matches if it contains the record's field, any other value must be equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCollectionAction;

impl FilterCollectionAction {
    fn matches(record: &Value, filter: &Map<String, Value>) -> bool {
        filter.iter().all(|(field, expected)| {
            let actual = record.get(field.as_str());
            match expected {
                Value::Array(allowed) => actual.is_some_and(|v| allowed.contains(v)),
                other => actual == Some(other),
            }
        })
    }
}

#[async_trait]
impl Action for FilterCollectionAction {
    fn name(&self) -> &str {
        "filter_collection"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let source = resolve_source(p.required("source")?, ctx);
        let Value::Array(records) = source.as_ref() else {
            return Err(ActionError::invalid(self.name(), "source", "must be an array"));
        };

        let filter = p.object("filter")?.cloned().unwrap_or_default();
        let kept: Vec<Value> = records
            .iter()
            .filter(|r| Self::matches(r, &filter))
            .cloned()
            .collect();

        info!(before = records.len(), after = kept.len(), "Filtered records");
        Ok(Value::Array(kept))
    }
}

/// `transform_data {source, slice_limit?, transforms?}`
///
/// Each transform assigns one output field:
///
/// * a string, resolved as a template with the record under `item.`
/// * `{type: map, source, mapping, default}`, a lookup table on one field
/// * `{type: concat, values, separator}`, joined template values
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformDataAction;

impl TransformDataAction {
    fn apply(item: &Value, transforms: &Map<String, Value>, ctx: &RunContext) -> Value {
        let Value::Object(fields) = item else {
            return item.clone();
        };

        let scope = ItemScope { item, ctx };
        let mut out = fields.clone();
        for (field, transform) in transforms {
            match transform {
                Value::String(text) => {
                    out.insert(field.clone(), template::resolve_str(text, &scope));
                }
                Value::Object(rule) => match rule.get("type").and_then(Value::as_str) {
                    Some("map") => {
                        out.insert(field.clone(), Self::map_field(item, rule));
                    }
                    Some("concat") => {
                        out.insert(field.clone(), Self::concat_field(rule, &scope));
                    }
                    other => warn!(field = %field, kind = ?other, "Unknown transform type"),
                },
                other => {
                    out.insert(field.clone(), other.clone());
                }
            }
        }
        Value::Object(out)
    }

    fn map_field(item: &Value, rule: &Map<String, Value>) -> Value {
        let default = rule.get("default").cloned().unwrap_or(Value::Null);
        let key = rule
            .get("source")
            .and_then(Value::as_str)
            .and_then(|source| item.get(source))
            .map(render);

        key.and_then(|k| rule.get("mapping").and_then(|m| m.get(k.as_str())))
            .filter(|v| is_truthy(v))
            .cloned()
            .unwrap_or(default)
    }

    fn concat_field(rule: &Map<String, Value>, scope: &ItemScope<'_>) -> Value {
        let separator = rule.get("separator").and_then(Value::as_str).unwrap_or("");
        let parts: Vec<String> = rule
            .get("values")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .map(|v| render(&template::resolve(v, scope)))
                    .collect()
            })
            .unwrap_or_default();
        Value::String(parts.join(separator))
    }
}

#[async_trait]
impl Action for TransformDataAction {
    fn name(&self) -> &str {
        "transform_data"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let source = resolve_source(p.required("source")?, ctx).into_owned();
        let mut records = match source {
            Value::Array(items) => items,
            other => vec![other],
        };

        if let Some(limit) = p.opt_usize("slice_limit")? {
            records.truncate(limit);
        }

        // The runner leaves `item.` placeholders untouched; they resolve here.
        if let Some(transforms) = p.object("transforms")? {
            records = records
                .iter()
                .map(|item| Self::apply(item, transforms, ctx))
                .collect();
        }

        info!(count = records.len(), "Transformed records");
        Ok(Value::Array(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> RunContext {
        RunContext::new(HashMap::new(), Map::new())
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_filter_equality_and_membership() {
        let mut ctx = ctx();
        ctx.collections.set(
            "vendors",
            vec![
                json!({"city": "Austin", "kind": "florist"}),
                json!({"city": "Dallas", "kind": "florist"}),
                json!({"city": "Austin", "kind": "caterer"}),
                json!({"city": "Austin"}),
            ],
        );

        let out = FilterCollectionAction
            .execute(
                &params(json!({
                    "source": "collections.vendors",
                    "filter": {"city": "Austin", "kind": ["florist", "caterer"]}
                })),
                &mut ctx,
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            json!([
                {"city": "Austin", "kind": "florist"},
                {"city": "Austin", "kind": "caterer"}
            ])
        );
    }

    #[tokio::test]
    async fn test_filter_requires_array_source() {
        let err = FilterCollectionAction
            .execute(&params(json!({"source": {"a": 1}})), &mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidParam { .. }));
    }

    #[tokio::test]
    async fn test_transform_slice_limit() {
        let out = TransformDataAction
            .execute(
                &params(json!({"source": [1, 2, 3, 4], "slice_limit": "2"})),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_transform_wraps_single_record() {
        let out = TransformDataAction
            .execute(&params(json!({"source": {"id": 1}})), &mut ctx())
            .await
            .unwrap();
        assert_eq!(out, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_transform_fields() {
        let mut ctx = ctx();
        ctx.vars.insert("source_tag".into(), json!("csv"));
        let out = TransformDataAction
            .execute(
                &params(json!({
                    "source": [
                        {"first": "Ada", "last": "Lovelace", "tier": "a"},
                        {"first": "Alan", "last": "Turing", "tier": "z"}
                    ],
                    "transforms": {
                        "email": "${item.first}@example.com",
                        "origin": "${vars.source_tag}",
                        "level": {"type": "map", "source": "tier", "mapping": {"a": "gold"}, "default": "basic"},
                        "full": {"type": "concat", "values": ["${item.first}", "${item.last}"], "separator": " "}
                    }
                })),
                &mut ctx,
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            json!([
                {
                    "first": "Ada", "last": "Lovelace", "tier": "a",
                    "email": "Ada@example.com", "origin": "csv",
                    "level": "gold", "full": "Ada Lovelace"
                },
                {
                    "first": "Alan", "last": "Turing", "tier": "z",
                    "email": "Alan@example.com", "origin": "csv",
                    "level": "basic", "full": "Alan Turing"
                }
            ])
        );
    }
}
