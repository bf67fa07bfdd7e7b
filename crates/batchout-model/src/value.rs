use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::fmt;

/// A value an Index enumerates: either a position (`for_list`) or a key
/// (`for_object`, `from_list`). Formatted into a path template's
/// `{name}` placeholders by `Bindings::format`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int(i) => write!(f, "{i}"),
            IndexValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// The ordered set of index bindings in scope while building one row. Keys
/// are index names; order is insertion order (outermost index first), kept
/// with `indexmap` so that iteration for the Cartesian product and for
/// `{name}` substitution is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Bindings(pub indexmap::IndexMap<String, IndexValue>);

impl Bindings {
    pub fn new() -> Self {
        Bindings(indexmap::IndexMap::new())
    }

    pub fn with(mut self, name: &str, value: IndexValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    /// Replaces every `{name}` placeholder in `template` with the bound
    /// value's Display form. Unbound placeholders are left as-is, mirroring
    /// Python `str.format(**kwargs)` only in the success path: this
    /// implementation never raises on a missing binding (a missing `{name}`
    /// surfaces later as a literal path segment, and extraction against it
    /// returns no match rather than aborting the run).
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' {
                let mut name = String::new();
                let mut closed = false;
                for c2 in chars.by_ref() {
                    if c2 == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c2);
                }
                if closed {
                    match self.0.get(&name) {
                        Some(v) => out.push_str(&v.to_string()),
                        None => {
                            out.push('{');
                            out.push_str(&name);
                            out.push('}');
                        }
                    }
                } else {
                    out.push('{');
                    out.push_str(&name);
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// A Column's cast result: the one scalar type each column kind produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Datetime(DateTime<Tz>),
}

/// Renders a JSON scalar the way the original's `str(value)` would, for
/// processors and the string column cast. Compound values fall back to
/// their JSON encoding.
pub fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Python-style truthiness, used by the boolean column cast.
pub fn scalar_is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_substitutes_bound_placeholders() {
        let bindings = Bindings::new().with("i", IndexValue::Int(3)).with("k", IndexValue::Str("x".into()));
        assert_eq!(bindings.format(".orders[{i}].{k}"), ".orders[3].x");
    }

    #[test]
    fn format_leaves_unbound_placeholder_untouched() {
        let bindings = Bindings::new();
        assert_eq!(bindings.format(".orders[{i}]"), ".orders[{i}]");
    }

    #[test]
    fn truthiness_matches_python_semantics() {
        assert!(!scalar_is_truthy(&serde_json::json!(0)));
        assert!(!scalar_is_truthy(&serde_json::json!("")));
        assert!(scalar_is_truthy(&serde_json::json!("x")));
        assert!(scalar_is_truthy(&serde_json::json!(1)));
    }
}
