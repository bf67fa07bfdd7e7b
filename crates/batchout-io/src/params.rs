use batchout_model::ColumnValue;
use std::fmt;

/// One bound value handed to `Input::fetch`, rendered the way the
/// underlying column was cast — used both for `{name}`-style path/URL
/// substitution and for direct lookup by adapters that need the raw value
/// (the HTTP input's default-vs-missing distinction).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Present(String),
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Present(s) => f.write_str(s),
            ParamValue::Null => Ok(()),
        }
    }
}

fn render(value: &ColumnValue) -> String {
    match value {
        ColumnValue::String(s) => s.clone(),
        ColumnValue::Integer(i) => i.to_string(),
        ColumnValue::Float(f) => f.to_string(),
        ColumnValue::Boolean(b) => b.to_string(),
        ColumnValue::Date(d) => d.to_string(),
        ColumnValue::Datetime(dt) => dt.to_rfc3339(),
    }
}

/// The named parameter tuple a reader task derives from one row of its
/// selector (or the empty tuple, for selector-less reader tasks), passed
/// to every `fetch` call for that row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams(indexmap::IndexMap<String, ParamValue>);

impl FetchParams {
    pub fn new() -> Self {
        FetchParams(indexmap::IndexMap::new())
    }

    pub fn from_row(columns: &[String], row: &[Option<ColumnValue>]) -> Self {
        let mut map = indexmap::IndexMap::new();
        for (name, value) in columns.iter().zip(row.iter()) {
            let rendered = match value {
                Some(v) => ParamValue::Present(render(v)),
                None => ParamValue::Null,
            };
            map.insert(name.clone(), rendered);
        }
        FetchParams(map)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replaces every `{name}` placeholder with the bound value's rendered
    /// form; a placeholder whose value is explicitly null or unbound is
    /// left untouched, same degrade-gracefully rule as `batchout_model::Bindings::format`.
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            let mut name = String::new();
            let mut closed = false;
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    closed = true;
                    break;
                }
                name.push(c2);
            }
            if !closed {
                out.push('{');
                out.push_str(&name);
                continue;
            }
            match self.0.get(&name) {
                Some(ParamValue::Present(v)) => out.push_str(v),
                Some(ParamValue::Null) | None => {
                    out.push('{');
                    out.push_str(&name);
                    out.push('}');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_substitutes_present_values() {
        let params = FetchParams::from_row(&["id".into()], &[Some(ColumnValue::Integer(7))]);
        assert_eq!(params.format("/orders/{id}.json"), "/orders/7.json");
    }

    #[test]
    fn format_leaves_null_binding_untouched() {
        let params = FetchParams::from_row(&["id".into()], &[None]);
        assert_eq!(params.format("/orders/{id}.json"), "/orders/{id}.json");
    }
}
