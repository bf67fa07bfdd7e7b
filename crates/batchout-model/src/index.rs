use crate::value::{Bindings, IndexValue};
use batchout_config::{ConfigError, Fragment, Registry};
use batchout_extract::{Extractor, ExtractResult};
use std::sync::OnceLock;

/// Enumerates repeated substructure in a payload: the set of positions or
/// keys a Map's children will each be evaluated against. `values` never
/// errors; an extraction that doesn't resolve to the expected shape just
/// yields an empty list, same as every "wrong shape" case in the original.
pub trait Index: Send + Sync {
    fn path(&self) -> &str;
    fn extractor_name(&self) -> &str;
    fn values(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Vec<IndexValue>;
}

struct ScalarIndexConfig {
    path: String,
    extractor_name: String,
}

impl ScalarIndexConfig {
    fn from_fragment(fragment: &Fragment) -> Result<Self, ConfigError> {
        Ok(ScalarIndexConfig {
            path: fragment.required("path")?,
            extractor_name: fragment.required("extractor")?,
        })
    }

    fn extracted<'p>(&self, extractor: &dyn Extractor, payload: &'p [u8], bindings: &Bindings) -> Option<serde_json::Value> {
        let formatted = bindings.format(&self.path);
        match extractor.extract(&formatted, payload) {
            ExtractResult::One(_, v) => v,
            ExtractResult::All(_, values) => Some(serde_json::Value::Array(values)),
        }
    }
}

/// `for_list`: the extracted value is a JSON array; the index range is
/// `[first_index .. first_index + len)`, honoring the extractor's own
/// indexing base (0 for JSON/regex, 1 for XML).
pub struct IndexForList(ScalarIndexConfig);

impl IndexForList {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Index>, ConfigError> {
        Ok(Box::new(IndexForList(ScalarIndexConfig::from_fragment(fragment)?)))
    }
}

impl Index for IndexForList {
    fn path(&self) -> &str {
        &self.0.path
    }

    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn values(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Vec<IndexValue> {
        match self.0.extracted(extractor, payload, bindings) {
            Some(serde_json::Value::Array(a)) => {
                let base = extractor.first_index() as i64;
                (0..a.len() as i64).map(|i| IndexValue::Int(base + i)).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// `for_object`: the extracted value is a JSON object; the index values are
/// its keys.
pub struct IndexForObject(ScalarIndexConfig);

impl IndexForObject {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Index>, ConfigError> {
        Ok(Box::new(IndexForObject(ScalarIndexConfig::from_fragment(fragment)?)))
    }
}

impl Index for IndexForObject {
    fn path(&self) -> &str {
        &self.0.path
    }

    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn values(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Vec<IndexValue> {
        match self.0.extracted(extractor, payload, bindings) {
            Some(serde_json::Value::Object(o)) => o.keys().map(|k| IndexValue::Str(k.clone())).collect(),
            _ => Vec::new(),
        }
    }
}

/// `from_list`: the extracted value is a JSON array of scalars; the index
/// values are the array's elements themselves, not their positions.
pub struct IndexFromList(ScalarIndexConfig);

impl IndexFromList {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Index>, ConfigError> {
        Ok(Box::new(IndexFromList(ScalarIndexConfig::from_fragment(fragment)?)))
    }
}

impl Index for IndexFromList {
    fn path(&self) -> &str {
        &self.0.path
    }

    fn extractor_name(&self) -> &str {
        &self.0.extractor_name
    }

    fn values(&self, extractor: &dyn Extractor, payload: &[u8], bindings: &Bindings) -> Vec<IndexValue> {
        match self.0.extracted(extractor, payload, bindings) {
            Some(serde_json::Value::Array(a)) => a
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => IndexValue::Str(s),
                    serde_json::Value::Number(n) if n.is_i64() => IndexValue::Int(n.as_i64().unwrap()),
                    other => IndexValue::Str(crate::value::scalar_to_string(&other)),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub fn registry() -> &'static Registry<Box<dyn Index>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Index>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("index"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("for_list", IndexForList::construct).expect("default indexes register exactly once");
        reg.bind("for_object", IndexForObject::construct).expect("default indexes register exactly once");
        reg.bind("from_list", IndexFromList::construct).expect("default indexes register exactly once");
    });
}
