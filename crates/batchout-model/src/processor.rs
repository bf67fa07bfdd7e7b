use crate::value::scalar_to_string;
use batchout_config::{ConfigError, Fragment, Registry};
use serde_json::Value;
use std::sync::OnceLock;

/// A pure value transformer chained before a Column casts its extracted
/// value. `process` never fails: a processor that can't make sense of its
/// input returns the input unchanged (matching `str(value)` coercions the
/// original's `ReplaceProcessor` performs unconditionally).
pub trait Processor: Send + Sync {
    fn process(&self, value: Value) -> Value;
}

/// Runs a chain of Processors left to right, as `WithProcessors._process`
/// does with `itertools.accumulate`.
pub fn apply_chain(chain: &[Box<dyn Processor>], value: Value) -> Value {
    chain.iter().fold(value, |v, p| p.process(v))
}

pub struct ReplaceProcessor {
    old: String,
    new: String,
    count: i64,
}

impl ReplaceProcessor {
    fn construct(fragment: &Fragment) -> Result<Box<dyn Processor>, ConfigError> {
        let old: String = fragment.required("old")?;
        let new: String = fragment.required("new")?;
        let count: i64 = fragment.with_default("count", -1)?;
        Ok(Box::new(ReplaceProcessor { old, new, count }))
    }
}

impl Processor for ReplaceProcessor {
    fn process(&self, value: Value) -> Value {
        let s = scalar_to_string(&value);
        let replaced = if self.count < 0 {
            s.replace(&self.old, &self.new)
        } else {
            s.replacen(&self.old, &self.new, self.count as usize)
        };
        Value::String(replaced)
    }
}

pub struct StripProcessor;

impl StripProcessor {
    fn construct(_fragment: &Fragment) -> Result<Box<dyn Processor>, ConfigError> {
        Ok(Box::new(StripProcessor))
    }
}

impl Processor for StripProcessor {
    fn process(&self, value: Value) -> Value {
        Value::String(scalar_to_string(&value).trim().to_string())
    }
}

pub struct LowerProcessor;

impl LowerProcessor {
    fn construct(_fragment: &Fragment) -> Result<Box<dyn Processor>, ConfigError> {
        Ok(Box::new(LowerProcessor))
    }
}

impl Processor for LowerProcessor {
    fn process(&self, value: Value) -> Value {
        Value::String(scalar_to_string(&value).to_lowercase())
    }
}

pub struct UpperProcessor;

impl UpperProcessor {
    fn construct(_fragment: &Fragment) -> Result<Box<dyn Processor>, ConfigError> {
        Ok(Box::new(UpperProcessor))
    }
}

impl Processor for UpperProcessor {
    fn process(&self, value: Value) -> Value {
        Value::String(scalar_to_string(&value).to_uppercase())
    }
}

pub fn registry() -> &'static Registry<Box<dyn Processor>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Processor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("processor"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("replace", ReplaceProcessor::construct).expect("default processors register exactly once");
        reg.bind("strip", StripProcessor::construct).expect("default processors register exactly once");
        reg.bind("lower", LowerProcessor::construct).expect("default processors register exactly once");
        reg.bind("upper", UpperProcessor::construct).expect("default processors register exactly once");
    });
}

/// Builds the ordered Processor chain for a `processors: [...]` config list.
pub fn build_chain(fragments: &[Fragment]) -> Result<Vec<Box<dyn Processor>>, ConfigError> {
    register_defaults();
    fragments.iter().map(|f| registry().create(f)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replace_all_occurrences_by_default() {
        let f = Fragment::from_value(serde_json::json!({"type": "replace", "old": "a", "new": "b"})).unwrap();
        let p = ReplaceProcessor::construct(&f).unwrap();
        assert_eq!(p.process(Value::String("banana".into())), Value::String("bbnbnb".into()));
    }

    #[test]
    fn replace_respects_count() {
        let f = Fragment::from_value(serde_json::json!({"type": "replace", "old": "a", "new": "b", "count": 1})).unwrap();
        let p = ReplaceProcessor::construct(&f).unwrap();
        assert_eq!(p.process(Value::String("banana".into())), Value::String("bbnana".into()));
    }

    #[test]
    fn chain_applies_in_order() {
        let chain: Vec<Box<dyn Processor>> = vec![Box::new(StripProcessor), Box::new(UpperProcessor)];
        let result = apply_chain(&chain, Value::String("  hi  ".into()));
        assert_eq!(result, Value::String("HI".into()));
    }
}
