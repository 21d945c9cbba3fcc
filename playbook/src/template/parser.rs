//! Parsing of `${...}` templates into segments and expressions.

use super::dynamic::DynamicToken;
use crate::errors::TemplateError;
use std::fmt;
use std::str::FromStr;

/// A piece of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied through verbatim.
    Literal(String),
    /// A `${...}` placeholder.
    Placeholder {
        /// The full placeholder text including `${` and `}`.
        raw: String,
        /// The expression between the braces.
        source: String,
    },
}

/// A template string split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Scans `input` for placeholders.
    ///
    /// Scanning never fails: a `${` without a closing brace, or with nothing
    /// between the braces, is kept as literal text.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let body = &rest[start + 2..];

            let Some(end) = find_closing_brace(body) else {
                literal.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let raw = &rest[start..start + 2 + end + 1];
            let source = &body[..end];
            if source.trim().is_empty() {
                literal.push_str(raw);
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder {
                    raw: raw.to_string(),
                    source: source.to_string(),
                });
            }
            rest = &body[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the template contains at least one placeholder.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder { .. }))
    }
}

/// Finds the `}` closing a placeholder body, skipping braces inside quotes
/// and nested `{...}` pairs. Falls back to the first `}` when quotes are
/// unbalanced so that the expression parser can report the problem.
fn find_closing_brace(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '{') => depth += 1,
            (None, '}') if depth == 0 => return Some(i),
            (None, '}') => depth -= 1,
            _ => {}
        }
    }

    body.find('}')
}

/// Variable namespaces a path may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Run environment snapshot (`env.VAR`).
    Env,
    /// Playbook configuration (`config.a.b`).
    Config,
    /// Run-scoped variables (`vars.a.b`).
    Vars,
    /// Named collections (`collections.name[.field]`).
    Collections,
    /// The record currently being transformed (`item.field`).
    Item,
}

impl FromStr for Namespace {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" => Ok(Self::Env),
            "config" => Ok(Self::Config),
            "vars" => Ok(Self::Vars),
            "collections" => Ok(Self::Collections),
            "item" => Ok(Self::Item),
            other => Err(TemplateError::UnknownNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "env"),
            Self::Config => write!(f, "config"),
            Self::Vars => write!(f, "vars"),
            Self::Collections => write!(f, "collections"),
            Self::Item => write!(f, "item"),
        }
    }
}

/// A namespace-qualified dotted path such as `vars.leads.0.email`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
    /// The namespace the path is looked up in.
    pub namespace: Namespace,
    /// Path segments after the namespace; never empty.
    pub segments: Vec<String>,
}

impl VarPath {
    /// Parses a dotted path. Bracket indices (`rows[0]`) are accepted as an
    /// alternative spelling of `rows.0`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNamespace` for an unrecognised first segment and
    /// `InvalidPath` for empty segments or a bare namespace.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TemplateError::EmptyExpression);
        }

        let mut parts = Vec::new();
        for part in text.split('.') {
            split_brackets(part, &mut parts).ok_or_else(|| TemplateError::InvalidPath(text.to_string()))?;
        }

        let (head, rest) = parts
            .split_first()
            .ok_or_else(|| TemplateError::InvalidPath(text.to_string()))?;
        let namespace = head.parse::<Namespace>()?;
        if rest.is_empty() {
            return Err(TemplateError::InvalidPath(text.to_string()));
        }

        Ok(Self {
            namespace,
            segments: rest.to_vec(),
        })
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.segments.join("."))
    }
}

fn split_brackets(part: &str, out: &mut Vec<String>) -> Option<()> {
    let (name, mut tail) = match part.find('[') {
        Some(i) => (&part[..i], &part[i..]),
        None => (part, ""),
    };
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return None;
    }
    out.push(name.to_string());

    while let Some(stripped) = tail.strip_prefix('[') {
        let close = stripped.find(']')?;
        let index = stripped[..close].trim();
        if index.is_empty() {
            return None;
        }
        out.push(index.to_string());
        tail = &stripped[close + 1..];
    }

    tail.is_empty().then_some(())
}

/// One operand of a `||` fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    /// A quoted string, returned without its quotes.
    Literal(String),
    /// A namespace path.
    Path(VarPath),
    /// A built-in dynamic value such as the current timestamp.
    Dynamic(DynamicToken),
    /// Text that is neither of the above; it never resolves.
    Opaque(String),
}

/// A parsed placeholder expression: one or more alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    /// The alternatives, in evaluation order.
    pub alternatives: Vec<Alternative>,
}

impl Expr {
    /// Parses the text between `${` and `}`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty alternatives, unterminated quotes and
    /// malformed paths under a known namespace.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let alternatives = split_alternatives(source)?
            .into_iter()
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { alternatives })
    }

    /// Returns true if the expression has a fallback chain.
    #[must_use]
    pub fn is_chain(&self) -> bool {
        self.alternatives.len() > 1
    }
}

/// Splits on `||` outside of quotes, parentheses and brackets.
fn split_alternatives(source: &str) -> Result<Vec<&str>, TemplateError> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, '|') if depth == 0 && matches!(chars.peek(), Some((_, '|'))) => {
                parts.push(&source[start..i]);
                chars.next();
                start = i + 2;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(TemplateError::UnterminatedQuote(source.trim().to_string()));
    }
    parts.push(&source[start..]);
    Ok(parts)
}

fn parse_alternative(text: &str) -> Result<Alternative, TemplateError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TemplateError::EmptyExpression);
    }

    if let Some(q) = text.chars().next().filter(|c| *c == '\'' || *c == '"') {
        if text.len() >= 2 && text.ends_with(q) {
            return Ok(Alternative::Literal(text[1..text.len() - 1].to_string()));
        }
        return Err(TemplateError::UnterminatedQuote(text.to_string()));
    }

    if let Some(token) = DynamicToken::parse(text) {
        return Ok(Alternative::Dynamic(token));
    }

    let head = text.split(['.', '[']).next().unwrap_or_default();
    if head.parse::<Namespace>().is_ok() {
        return VarPath::parse(text).map(Alternative::Path);
    }

    Ok(Alternative::Opaque(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn placeholder(raw: &str, source: &str) -> Segment {
        Segment::Placeholder {
            raw: raw.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_parse_plain_text() {
        let t = Template::parse("no placeholders here");
        assert_eq!(t.segments(), &[Segment::Literal("no placeholders here".into())]);
        assert!(!t.has_placeholders());
    }

    #[test]
    fn test_parse_mixed_segments() {
        let t = Template::parse("Hello ${vars.name}, batch ${vars.n}!");
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("Hello ".into()),
                placeholder("${vars.name}", "vars.name"),
                Segment::Literal(", batch ".into()),
                placeholder("${vars.n}", "vars.n"),
                Segment::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn test_parse_brace_inside_quotes() {
        let t = Template::parse("${env.X || 'a}b'}");
        assert_eq!(t.segments(), &[placeholder("${env.X || 'a}b'}", "env.X || 'a}b'")]);
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let t = Template::parse("cost: ${vars.price");
        assert_eq!(t.segments(), &[Segment::Literal("cost: ${vars.price".into())]);
    }

    #[test]
    fn test_empty_placeholder_is_literal() {
        let t = Template::parse("x${}y");
        assert_eq!(t.segments(), &[Segment::Literal("x${}y".into())]);
    }

    #[test]
    fn test_var_path_brackets() {
        let path = VarPath::parse("vars.rows[0].id").unwrap();
        assert_eq!(path.namespace, Namespace::Vars);
        assert_eq!(path.segments, vec!["rows", "0", "id"]);
        assert_eq!(path.to_string(), "vars.rows.0.id");
    }

    #[test]
    fn test_var_path_errors() {
        assert_eq!(
            VarPath::parse("secrets.key"),
            Err(TemplateError::UnknownNamespace("secrets".into()))
        );
        assert!(matches!(VarPath::parse("vars"), Err(TemplateError::InvalidPath(_))));
        assert!(matches!(VarPath::parse("vars..x"), Err(TemplateError::InvalidPath(_))));
    }

    #[test]
    fn test_expr_fallback_chain() {
        let expr = Expr::parse("env.API_URL || config.api_url || 'http://localhost'").unwrap();
        assert!(expr.is_chain());
        assert_eq!(expr.alternatives.len(), 3);
        assert_eq!(
            expr.alternatives[2],
            Alternative::Literal("http://localhost".into())
        );
    }

    #[test]
    fn test_expr_pipes_inside_quotes_do_not_split() {
        let expr = Expr::parse("'a || b'").unwrap();
        assert_eq!(expr.alternatives, vec![Alternative::Literal("a || b".into())]);
    }

    #[test]
    fn test_expr_dynamic_token() {
        let expr = Expr::parse("new Date().toISOString()").unwrap();
        assert_eq!(
            expr.alternatives,
            vec![Alternative::Dynamic(DynamicToken::Timestamp)]
        );
    }

    #[test]
    fn test_expr_opaque_text() {
        let expr = Expr::parse("Math.random()").unwrap();
        assert_eq!(expr.alternatives, vec![Alternative::Opaque("Math.random()".into())]);
    }

    #[test]
    fn test_expr_errors() {
        assert_eq!(Expr::parse("env.X || "), Err(TemplateError::EmptyExpression));
        assert!(matches!(
            Expr::parse("env.X || 'oops"),
            Err(TemplateError::UnterminatedQuote(_))
        ));
        assert!(matches!(Expr::parse("vars."), Err(TemplateError::InvalidPath(_))));
    }
}
