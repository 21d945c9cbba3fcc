//! Evaluation of parsed conditions.

use super::parser::Condition;
use crate::core::value::{is_truthy_opt, sequence_len};
use crate::template::Scope;
use tracing::{debug, warn};

impl Condition {
    /// Evaluates the condition against `scope`.
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> bool {
        match self {
            Self::All(parts) => parts.iter().all(|c| c.evaluate(scope)),
            Self::Any(parts) => parts.iter().any(|c| c.evaluate(scope)),
            Self::Not(inner) => !inner.evaluate(scope),
            Self::Length { path, op, value } => {
                let found = scope.lookup(path);
                let len = i64::try_from(sequence_len(found.as_ref())).unwrap_or(i64::MAX);
                op.apply(len, *value)
            }
            Self::UnresolvedLength { text, op, value } => {
                debug!(path = %text, "Length of an unresolvable path is zero");
                op.apply(0, *value)
            }
            Self::Truthy(path) => is_truthy_opt(scope.lookup(path).as_ref()),
            Self::Unknown(text) => {
                debug!(condition = %text, "Condition uses an unknown namespace");
                false
            }
        }
    }
}

/// Evaluates an optional `when` expression.
///
/// An absent condition is true. A condition that fails to parse is false.
pub fn evaluate<S: Scope + ?Sized>(condition: Option<&str>, scope: &S) -> bool {
    let Some(text) = condition else {
        return true;
    };

    match Condition::parse(text) {
        Ok(parsed) => parsed.evaluate(scope),
        Err(err) => {
            warn!(condition = %text, error = %err, "Could not parse condition, treating as false");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::lookup_in_map;
    use crate::template::{Namespace, VarPath};
    use serde_json::{json, Map, Value};

    struct VarsScope(Map<String, Value>);

    impl VarsScope {
        fn new(vars: Value) -> Self {
            Self(vars.as_object().cloned().unwrap_or_default())
        }
    }

    impl Scope for VarsScope {
        fn lookup(&self, path: &VarPath) -> Option<Value> {
            match path.namespace {
                Namespace::Vars => lookup_in_map(&self.0, &path.segments),
                _ => None,
            }
        }
    }

    #[test]
    fn test_absent_condition_is_true() {
        assert!(evaluate(None, &VarsScope::new(json!({}))));
    }

    #[test]
    fn test_length_on_absent_path_is_zero() {
        let scope = VarsScope::new(json!({}));
        assert!(!evaluate(Some("vars.missing.length >= 3"), &scope));
        assert!(evaluate(Some("vars.missing.length == 0"), &scope));
    }

    #[test]
    fn test_length_on_non_sequence_is_zero() {
        let scope = VarsScope::new(json!({"name": "abc"}));
        assert!(evaluate(Some("vars.name.length === 0"), &scope));
    }

    #[test]
    fn test_length_comparisons() {
        let scope = VarsScope::new(json!({"rows": [1, 2, 3]}));
        assert!(evaluate(Some("vars.rows.length >= 3"), &scope));
        assert!(evaluate(Some("vars.rows.length > 2"), &scope));
        assert!(!evaluate(Some("vars.rows.length < 3"), &scope));
        assert!(evaluate(Some("vars.rows.length <= 3"), &scope));
        assert!(evaluate(Some("vars.rows.length != 4"), &scope));
    }

    #[test]
    fn test_truthiness() {
        let scope = VarsScope::new(json!({
            "zero": 0, "empty": "", "off": false, "nil": null,
            "list": [], "obj": {}, "name": "x"
        }));
        for falsy in ["vars.zero", "vars.empty", "vars.off", "vars.nil", "vars.none"] {
            assert!(!evaluate(Some(falsy), &scope), "{falsy} should be false");
        }
        for truthy in ["vars.list", "vars.obj", "vars.name"] {
            assert!(evaluate(Some(truthy), &scope), "{truthy} should be true");
        }
    }

    #[test]
    fn test_boolean_combinations() {
        let scope = VarsScope::new(json!({"a": true, "b": false}));
        assert!(!evaluate(Some("vars.a && vars.b"), &scope));
        assert!(evaluate(Some("vars.a || vars.b"), &scope));
        assert!(evaluate(Some("!vars.b"), &scope));
        assert!(evaluate(Some("vars.a && !vars.b"), &scope));
    }

    #[test]
    fn test_unknown_namespace_and_parse_errors_are_false() {
        let scope = VarsScope::new(json!({"a": true}));
        assert!(!evaluate(Some("secrets.a"), &scope));
        assert!(!evaluate(Some("vars.a.length ~ 2"), &scope));
        assert!(evaluate(Some("!secrets.a"), &scope));
    }

    #[test]
    fn test_bad_operand_does_not_sink_the_rest() {
        let scope = VarsScope::new(json!({"a": true, "rows": [1, 2]}));
        assert!(evaluate(Some("vars.a || vars.rows.length > many"), &scope));
        assert!(evaluate(Some("vars.rows.length <> 1 || vars.rows.length == 2"), &scope));
        assert!(!evaluate(Some("vars.a && vars.rows.length > many"), &scope));
    }

    #[test]
    fn test_length_of_bare_namespace_is_zero() {
        let scope = VarsScope::new(json!({"a": true}));
        assert!(evaluate(Some("vars.length == 0"), &scope));
        assert!(!evaluate(Some("vars.length > 0"), &scope));
    }
}
