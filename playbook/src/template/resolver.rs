//! Resolution of parsed templates against a variable scope.

use super::parser::{Alternative, Expr, Namespace, Segment, Template, VarPath};
use crate::core::value::{is_truthy, render};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Something paths can be looked up in.
///
/// The run context serves every namespace except `item`. Narrower scopes
/// declare what they serve through [`Scope::provides`].
pub trait Scope {
    /// Returns the value at `path`, or `None` when it is undefined.
    fn lookup(&self, path: &VarPath) -> Option<Value>;

    /// Returns false for namespaces this scope does not serve. Placeholders
    /// that mention such a namespace are left verbatim for a later pass.
    fn provides(&self, namespace: Namespace) -> bool {
        let _ = namespace;
        true
    }
}

/// A scope that only answers `env.*` lookups.
///
/// Used when resolving the playbook's `config` section, which is resolved
/// once at load time before any variables exist.
#[derive(Debug, Clone, Copy)]
pub struct EnvScope<'a>(pub &'a HashMap<String, String>);

impl Scope for EnvScope<'_> {
    fn lookup(&self, path: &VarPath) -> Option<Value> {
        match path.namespace {
            Namespace::Env => lookup_env(self.0, &path.segments),
            _ => None,
        }
    }

    fn provides(&self, namespace: Namespace) -> bool {
        namespace == Namespace::Env
    }
}

/// Looks a single environment variable up. Env values are flat strings, so
/// deeper paths are undefined.
#[must_use]
pub fn lookup_env(env: &HashMap<String, String>, segments: &[String]) -> Option<Value> {
    match segments {
        [name] => env.get(name).map(|v| Value::String(v.clone())),
        _ => None,
    }
}

/// The outcome of evaluating one placeholder.
#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Found(Value),
    Undefined,
    Unresolved,
}

/// Resolves every string in `value`, recursing into arrays and objects.
/// Non-string scalars are returned unchanged.
pub fn resolve<S: Scope + ?Sized>(value: &Value, scope: &S) -> Value {
    match value {
        Value::String(s) => resolve_str(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, scope)).collect()),
        Value::Object(map) => Value::Object(resolve_params(map, scope)),
        other => other.clone(),
    }
}

/// Resolves every value of a parameter map.
pub fn resolve_params<S: Scope + ?Sized>(params: &Map<String, Value>, scope: &S) -> Map<String, Value> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), resolve(v, scope)))
        .collect()
}

/// Resolves a single template string.
///
/// A string that is exactly one placeholder yields the raw looked-up value,
/// so `"${vars.count}"` can produce a number or an array. Otherwise each
/// placeholder is rendered and spliced into the surrounding text.
pub fn resolve_str<S: Scope + ?Sized>(input: &str, scope: &S) -> Value {
    if !input.contains("${") {
        return Value::String(input.to_string());
    }

    let template = Template::parse(input);
    if let [Segment::Placeholder { raw, source }] = template.segments() {
        return match evaluate_placeholder(raw, source, scope) {
            Resolution::Found(value) => value,
            Resolution::Undefined => Value::String(String::new()),
            Resolution::Unresolved => Value::String(raw.clone()),
        };
    }

    let mut out = String::with_capacity(input.len());
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder { raw, source } => match evaluate_placeholder(raw, source, scope) {
                Resolution::Found(value) => out.push_str(&render(&value)),
                Resolution::Undefined => {}
                Resolution::Unresolved => out.push_str(raw),
            },
        }
    }
    Value::String(out)
}

fn evaluate_placeholder<S: Scope + ?Sized>(raw: &str, source: &str, scope: &S) -> Resolution {
    match Expr::parse(source) {
        Ok(expr) => evaluate_expr(&expr, scope),
        Err(err) => {
            warn!(placeholder = %raw, error = %err, "Could not parse template expression");
            Resolution::Unresolved
        }
    }
}

fn evaluate_expr<S: Scope + ?Sized>(expr: &Expr, scope: &S) -> Resolution {
    let deferred = expr
        .alternatives
        .iter()
        .any(|alt| matches!(alt, Alternative::Path(path) if !scope.provides(path.namespace)));
    if deferred {
        return Resolution::Unresolved;
    }

    if let [single] = expr.alternatives.as_slice() {
        return match single {
            Alternative::Literal(text) => Resolution::Found(Value::String(text.clone())),
            Alternative::Path(path) => scope
                .lookup(path)
                .map_or(Resolution::Undefined, Resolution::Found),
            Alternative::Dynamic(token) => Resolution::Found(token.evaluate()),
            Alternative::Opaque(_) => Resolution::Unresolved,
        };
    }

    for alternative in &expr.alternatives {
        match alternative {
            Alternative::Literal(text) => return Resolution::Found(Value::String(text.clone())),
            Alternative::Dynamic(token) => return Resolution::Found(token.evaluate()),
            Alternative::Path(path) => {
                if let Some(value) = scope.lookup(path) {
                    if is_truthy(&value) && !is_raw_placeholder(&value) {
                        return Resolution::Found(value);
                    }
                }
            }
            Alternative::Opaque(_) => {}
        }
    }

    Resolution::Found(Value::String(String::new()))
}

/// A value that is itself still an unresolved placeholder does not satisfy
/// a fallback chain.
fn is_raw_placeholder(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with("${") && s.ends_with('}'))
}
