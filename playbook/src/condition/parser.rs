//! Parsing of `when` expressions into a [`Condition`] tree.

use crate::errors::{ConditionError, TemplateError};
use crate::template::VarPath;
use std::fmt;
use tracing::warn;

/// A comparison operator in a `.length` test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==` or `===`
    Eq,
    /// `!=` or `!==`
    Ne,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Result<Self, ConditionError> {
        match symbol {
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "==" | "===" => Ok(Self::Eq),
            "!=" | "!==" => Ok(Self::Ne),
            other => Err(ConditionError::UnknownOperator(other.to_string())),
        }
    }

    /// Applies the operator to `lhs` and `rhs`.
    #[must_use]
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// A parsed `when` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Every operand must hold (`a && b`).
    All(Vec<Condition>),
    /// At least one operand must hold (`a || b`).
    Any(Vec<Condition>),
    /// Negation (`!a`).
    Not(Box<Condition>),
    /// `<path>.length <op> <int>`.
    Length {
        /// The sequence being measured.
        path: VarPath,
        /// The comparison.
        op: CompareOp,
        /// The right-hand side.
        value: i64,
    },
    /// A `.length` comparison whose path cannot resolve to anything, such as
    /// a bare namespace. The length is taken as zero.
    UnresolvedLength {
        /// The path text as written.
        text: String,
        /// The comparison.
        op: CompareOp,
        /// The right-hand side.
        value: i64,
    },
    /// Truthiness of the value at a path.
    Truthy(VarPath),
    /// A path outside the known namespaces; always false.
    Unknown(String),
}

impl Condition {
    /// Parses a condition.
    ///
    /// ` && ` is split before ` || `, and only one level of either is
    /// recognised per operand; there is no grouping syntax. An operand that
    /// fails to parse becomes an [`Condition::Unknown`] leaf so the other
    /// operands still decide the result.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty condition, bad comparison syntax and
    /// malformed paths.
    pub fn parse(input: &str) -> Result<Self, ConditionError> {
        let text = strip_wrapper(input.trim());
        if text.is_empty() {
            return Err(ConditionError::Empty);
        }

        if text.contains(" && ") {
            return Ok(Self::All(text.split(" && ").map(parse_operand).collect()));
        }
        if text.contains(" || ") {
            return Ok(Self::Any(text.split(" || ").map(parse_operand).collect()));
        }

        if let Some(rest) = text.strip_prefix('!') {
            return Ok(Self::Not(Box::new(Self::parse(rest)?)));
        }

        if let Some(condition) = parse_length(text)? {
            return Ok(condition);
        }

        path_condition(text, Self::Truthy)
    }
}

fn parse_operand(text: &str) -> Condition {
    Condition::parse(text).unwrap_or_else(|err| {
        warn!(operand = %text.trim(), error = %err, "Unparseable operand, treating as false");
        Condition::Unknown(text.trim().to_string())
    })
}

fn strip_wrapper(text: &str) -> &str {
    text.strip_prefix("${")
        .and_then(|inner| inner.strip_suffix('}'))
        .map_or(text, str::trim)
}

fn path_condition(
    text: &str,
    build: impl FnOnce(VarPath) -> Condition,
) -> Result<Condition, ConditionError> {
    match VarPath::parse(text) {
        Ok(path) => Ok(build(path)),
        Err(TemplateError::UnknownNamespace(_)) => Ok(Condition::Unknown(text.to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Recognises `<path>.length <op> <int>`. Returns `Ok(None)` when the text
/// is not a length comparison at all.
fn parse_length(text: &str) -> Result<Option<Condition>, ConditionError> {
    const MARKER: &str = ".length";

    for (idx, _) in text.match_indices(MARKER) {
        let after = &text[idx + MARKER.len()..];
        if after
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            continue;
        }

        let rest = after.trim_start();
        if rest.is_empty() {
            return Ok(None);
        }

        let symbol_len = rest
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '!'))
            .unwrap_or(rest.len());
        if symbol_len == 0 {
            return Err(ConditionError::InvalidComparison(text.to_string()));
        }
        let op = CompareOp::from_symbol(&rest[..symbol_len])?;
        let value = rest[symbol_len..]
            .trim()
            .parse::<i64>()
            .map_err(|_| ConditionError::InvalidComparison(text.to_string()))?;

        let path_text = text[..idx].trim();
        let condition = match VarPath::parse(path_text) {
            Ok(path) => Condition::Length { path, op, value },
            Err(_) => Condition::UnresolvedLength {
                text: path_text.to_string(),
                op,
                value,
            },
        };
        return Ok(Some(condition));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Namespace;
    use pretty_assertions::assert_eq;

    fn path(text: &str) -> VarPath {
        VarPath::parse(text).unwrap()
    }

    #[test]
    fn test_parse_truthy() {
        assert_eq!(
            Condition::parse("vars.ready").unwrap(),
            Condition::Truthy(path("vars.ready"))
        );
    }

    #[test]
    fn test_parse_strips_wrapper() {
        assert_eq!(
            Condition::parse("${env.DRY_RUN}").unwrap(),
            Condition::Truthy(path("env.DRY_RUN"))
        );
    }

    #[test]
    fn test_parse_length() {
        let cond = Condition::parse("collections.leads.length >= 3").unwrap();
        assert_eq!(
            cond,
            Condition::Length {
                path: path("collections.leads"),
                op: CompareOp::Ge,
                value: 3,
            }
        );
    }

    #[test]
    fn test_parse_strict_operators() {
        let cond = Condition::parse("vars.rows.length !== 0").unwrap();
        assert!(matches!(cond, Condition::Length { op: CompareOp::Ne, value: 0, .. }));
        let cond = Condition::parse("vars.rows.length===2").unwrap();
        assert!(matches!(cond, Condition::Length { op: CompareOp::Eq, value: 2, .. }));
    }

    #[test]
    fn test_length_marker_needs_word_boundary() {
        let cond = Condition::parse("vars.length_stats").unwrap();
        match cond {
            Condition::Truthy(p) => {
                assert_eq!(p.namespace, Namespace::Vars);
                assert_eq!(p.segments, vec!["length_stats"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_and_is_split_before_or() {
        let cond = Condition::parse("vars.a || vars.b && vars.c").unwrap();
        assert_eq!(
            cond,
            Condition::All(vec![
                Condition::Any(vec![
                    Condition::Truthy(path("vars.a")),
                    Condition::Truthy(path("vars.b")),
                ]),
                Condition::Truthy(path("vars.c")),
            ])
        );
    }

    #[test]
    fn test_negation_applies_to_length_test() {
        let cond = Condition::parse("!vars.rows.length > 0").unwrap();
        assert!(matches!(cond, Condition::Not(inner) if matches!(*inner, Condition::Length { .. })));
    }

    #[test]
    fn test_unknown_namespace() {
        assert_eq!(
            Condition::parse("secrets.token").unwrap(),
            Condition::Unknown("secrets.token".to_string())
        );
    }

    #[test]
    fn test_bad_operand_becomes_unknown_leaf() {
        assert_eq!(
            Condition::parse("vars.a || vars.rows.length > many").unwrap(),
            Condition::Any(vec![
                Condition::Truthy(path("vars.a")),
                Condition::Unknown("vars.rows.length > many".to_string()),
            ])
        );
        assert_eq!(
            Condition::parse("vars.a && vars.rows.length <> 1").unwrap(),
            Condition::All(vec![
                Condition::Truthy(path("vars.a")),
                Condition::Unknown("vars.rows.length <> 1".to_string()),
            ])
        );
    }

    #[test]
    fn test_length_of_bare_namespace() {
        assert_eq!(
            Condition::parse("vars.length == 0").unwrap(),
            Condition::UnresolvedLength {
                text: "vars".to_string(),
                op: CompareOp::Eq,
                value: 0,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Condition::parse("  "), Err(ConditionError::Empty));
        assert_eq!(
            Condition::parse("vars.rows.length <> 1"),
            Err(ConditionError::UnknownOperator("<>".to_string()))
        );
        assert!(matches!(
            Condition::parse("vars.rows.length > many"),
            Err(ConditionError::InvalidComparison(_))
        ));
        assert!(matches!(Condition::parse("vars.a && "), Err(_)));
    }
}
