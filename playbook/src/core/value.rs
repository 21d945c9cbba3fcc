//! Helpers over `serde_json::Value`, the engine's universal value type.
//!
//! Templates, conditions, collections and action results all move around
//! as JSON values. "Undefined" (a lookup that found nothing) is modelled as
//! `None` rather than as `Value::Null`.

use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Walks `segments` into `root`.
///
/// Objects are indexed by key, arrays by numeric segment; `length` on an
/// array yields its length. Any other step through a non-container yields
/// `None`.
#[must_use]
pub fn lookup_path(root: &Value, segments: &[String]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(root.clone());
    };

    match root {
        Value::Object(map) => map.get(head).and_then(|next| lookup_path(next, rest)),
        Value::Array(items) => {
            if head == "length" && rest.is_empty() {
                return Some(Value::from(items.len()));
            }
            let index = head.parse::<usize>().ok()?;
            items.get(index).and_then(|next| lookup_path(next, rest))
        }
        _ => None,
    }
}

/// Looks a dotted path up in a map; the first segment selects the entry.
#[must_use]
pub fn lookup_in_map(map: &Map<String, Value>, segments: &[String]) -> Option<Value> {
    let (head, rest) = segments.split_first()?;
    map.get(head).and_then(|value| lookup_path(value, rest))
}

/// Truthiness used by `when` clauses and fallback chains.
///
/// `null`, `false`, `0`, and the empty string are falsy. Everything else,
/// including empty arrays and objects, is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Like [`is_truthy`] but also treats undefined as falsy.
#[must_use]
pub fn is_truthy_opt(value: Option<&Value>) -> bool {
    value.is_some_and(is_truthy)
}

/// Renders a value for inline interpolation into a larger string.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Length of a value when treated as a sequence; non-arrays count as zero.
#[must_use]
pub fn sequence_len(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    }
}

/// Interprets a number or numeric string as a non-negative integer.
#[must_use]
pub fn as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Interprets a bool or a `"true"`/`"false"` string.
#[must_use]
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

/// Serializes a value with object keys in sorted order.
///
/// Two records with the same fields and values produce the same text no
/// matter how their keys were ordered on input.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", Value::String(key.clone()));
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}
