//! Scalar literal evaluation and rendering.

use std::fmt;

/// A decoded markup value.
///
/// Mappings keep declaration order, so two documents compare equal only
/// when their entries appear in the same order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Vec<(Value, Value)>),
}

impl Value {
    /// Evaluate a scalar token the way a literal would be read.
    ///
    /// Numbers, booleans and null become typed values, quoted tokens are
    /// unquoted, everything else stays a plain string.
    pub fn literal(token: &str) -> Value {
        let token = token.trim();
        match token {
            "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
            "true" | "True" | "TRUE" => return Value::Bool(true),
            "false" | "False" | "FALSE" => return Value::Bool(false),
            _ => {}
        }

        if let Some(unquoted) = unquote(token) {
            return Value::String(unquoted);
        }

        if looks_numeric(token) {
            if let Ok(i) = token.parse::<i64>() {
                return Value::Integer(i);
            }
            if let Ok(f) = token.parse::<f64>() {
                return Value::Float(f);
            }
        }

        Value::String(token.to_string())
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Sequence(_) | Value::Mapping(_))
    }

    /// The text used when this value is a mapping key.
    pub fn key_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.render(),
        }
    }

    /// Render the value as a token that reads back as the same value.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::String(s) => render_string(s),
            Value::Sequence(items) => {
                let items: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Mapping(entries) if entries.is_empty() => "{}".to_string(),
            Value::Mapping(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.render(), v.render()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => f.write_str(&other.render()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

fn looks_numeric(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

fn unquote(token: &str) -> Option<String> {
    if token.len() < 2 {
        return None;
    }
    if token.starts_with('\'') && token.ends_with('\'') {
        return Some(token[1..token.len() - 1].replace("''", "'"));
    }
    if token.starts_with('"') && token.ends_with('"') {
        let inner = &token[1..token.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        return Some(out);
    }
    None
}

/// Whether a plain (unquoted) string would read back unchanged.
fn is_plain_safe(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') || s.contains(['\n', '\r', '\t'])
    {
        return false;
    }
    if s.starts_with(['[', ']', '{', '}', '#', '\'', '"', '&', '*', '!', '|', '>', '%', '@', '`', ','])
    {
        return false;
    }
    if s == "-" || s.starts_with("- ") {
        return false;
    }
    Value::literal(s) == Value::String(s.to_string())
}

fn render_string(s: &str) -> String {
    if is_plain_safe(s) {
        return s.to_string();
    }
    if s.contains(['\n', '\r', '\t', '\\']) || s.contains('\'') {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        return format!("\"{}\"", escaped);
    }
    format!("'{}'", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_evaluation() {
        assert_eq!(Value::literal("123"), Value::Integer(123));
        assert_eq!(Value::literal("-4"), Value::Integer(-4));
        assert_eq!(Value::literal("1.5"), Value::Float(1.5));
        assert_eq!(Value::literal("true"), Value::Bool(true));
        assert_eq!(Value::literal("~"), Value::Null);
        assert_eq!(Value::literal("1.0.0"), Value::String("1.0.0".into()));
        assert_eq!(Value::literal("inf"), Value::String("inf".into()));
        assert_eq!(Value::literal("'1.0'"), Value::String("1.0".into()));
        assert_eq!(Value::literal("\"a\\\"b\""), Value::String("a\"b".into()));
        assert_eq!(Value::literal("'it''s'"), Value::String("it's".into()));
    }

    #[test]
    fn test_render_quotes_ambiguous_strings() {
        assert_eq!(Value::from("1.0").render(), "'1.0'");
        assert_eq!(Value::from("true").render(), "'true'");
        assert_eq!(Value::from("").render(), "''");
        assert_eq!(Value::from("a: b").render(), "'a: b'");
        assert_eq!(Value::from("-Wall").render(), "-Wall");
        assert_eq!(Value::from("it's").render(), "it's");
        assert_eq!(Value::from("'quoted'").render(), "\"'quoted'\"");
        assert_eq!(Value::Float(1.0).render(), "1.0");
    }

    #[test]
    fn test_rendered_values_read_back() {
        for value in [
            Value::from("plain"),
            Value::from("needs: quoting"),
            Value::from("line\nbreak"),
            Value::from("it's"),
            Value::Integer(42),
            Value::Float(0.25),
            Value::Bool(false),
            Value::Null,
        ] {
            assert_eq!(Value::literal(&value.render()), value);
        }
    }
}
