use crate::error::ExtractError;
use crate::strategy::{apply_strategy, ExtractResult, Strategy};
use crate::Extractor;
use batchout_config::{ConfigError, Fragment};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ALLOWED: &[Strategy] = &[Strategy::TakeFirst, Strategy::TakeLast, Strategy::TakeAll];

/// Extracts named capture groups from a raw-text payload. `path` is the
/// regex pattern itself, compiled once and cached. Each match contributes
/// one `(group_name, group_value)` pair per named group that matched (or a
/// single `(path, whole_match)` pair when the pattern has no named groups);
/// `take_all` flattens every match's pairs across the whole payload.
pub struct RegexExtractor {
    strategy: Strategy,
    encoding_is_utf8: bool,
    parsers: Mutex<HashMap<String, Arc<Regex>>>,
}

impl RegexExtractor {
    pub fn new(strategy: Strategy) -> Result<Self, ExtractError> {
        strategy.validate(ALLOWED)?;
        Ok(RegexExtractor {
            strategy,
            encoding_is_utf8: true,
            parsers: Mutex::new(HashMap::new()),
        })
    }

    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Extractor>, ConfigError> {
        let strategy_name = fragment.choice("strategy", &["take_first", "take_last", "take_all"], Some("take_first"))?;
        let strategy = Strategy::parse(&strategy_name).expect("choice() validated membership");
        RegexExtractor::new(strategy)
            .map(|e| Box::new(e) as Box<dyn Extractor>)
            .map_err(|e| ConfigError::invalid("strategy", e.to_string()))
    }

    fn compiled(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        let mut parsers = self.parsers.lock().unwrap();
        if let Some(re) = parsers.get(pattern) {
            return Ok(re.clone());
        }
        let re = Arc::new(Regex::new(pattern)?);
        parsers.insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

impl Extractor for RegexExtractor {
    fn first_index(&self) -> usize {
        0
    }

    fn extract(&self, path: &str, payload: &[u8]) -> ExtractResult {
        if !self.encoding_is_utf8 {
            return ExtractResult::none();
        }
        let text = match std::str::from_utf8(payload) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to decode payload as utf-8");
                return ExtractResult::none();
            }
        };
        let re = match self.compiled(path) {
            Ok(re) => re,
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to compile regex");
                return ExtractResult::none();
            }
        };
        let names: Vec<&str> = re.capture_names().flatten().collect();
        let mut pairs = Vec::new();
        for caps in re.captures_iter(text) {
            if names.is_empty() {
                if let Some(m) = caps.get(0) {
                    pairs.push((path.to_string(), Value::String(m.as_str().to_string())));
                }
            } else {
                for name in &names {
                    if let Some(m) = caps.name(name) {
                        pairs.push((name.to_string(), Value::String(m.as_str().to_string())));
                    }
                }
            }
        }
        apply_strategy(self.strategy, pairs.into_iter())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn take_first_returns_first_whole_match_without_named_groups() {
        let ex = RegexExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(r"\d+", b"order 42 and 7");
        assert_eq!(r, ExtractResult::One(Some(r"\d+".into()), Some(Value::String("42".into()))));
    }

    #[test]
    fn named_groups_become_separate_pairs() {
        let ex = RegexExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(r"(?P<id>\d+):(?P<qty>\d+)", b"17:3");
        assert_eq!(r, ExtractResult::One(Some("id".into()), Some(Value::String("17".into()))));
    }

    #[test]
    fn take_all_flattens_across_matches() {
        let ex = RegexExtractor::new(Strategy::TakeAll).unwrap();
        let r = ex.extract(r"\d+", b"1 2 3");
        match r {
            ExtractResult::All(_, values) => {
                assert_eq!(values, vec![Value::String("1".into()), Value::String("2".into()), Value::String("3".into())]);
            }
            other => panic!("expected All, got {other:?}"),
        }
    }

    #[test]
    fn no_match_yields_none() {
        let ex = RegexExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(r"\d+", b"no digits here");
        assert_eq!(r, ExtractResult::none());
    }

    #[test]
    fn take_first_not_null_is_unsupported() {
        assert!(RegexExtractor::new(Strategy::TakeFirstNotNull).is_err());
    }
}
