use crate::error::ExtractError;
use crate::pointer::{Pointer, Token};
use crate::strategy::{apply_strategy, ExtractResult, Strategy};
use crate::Extractor;
use batchout_config::{ConfigError, Fragment};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

const ALLOWED: &[Strategy] = &[
    Strategy::TakeFirst,
    Strategy::TakeFirstNotNull,
    Strategy::TakeLast,
    Strategy::TakeLastNotNull,
    Strategy::TakeAll,
];

/// Extracts from a JSON payload using `.prop[N]` / wildcard paths over
/// `serde_json::Value`. Indices are 0-based, matching `first_index() == 0`.
pub struct JsonPointerExtractor {
    strategy: Strategy,
    parsers: Mutex<HashMap<String, std::sync::Arc<Pointer>>>,
}

impl JsonPointerExtractor {
    pub fn new(strategy: Strategy) -> Result<Self, ExtractError> {
        strategy.validate(ALLOWED)?;
        Ok(JsonPointerExtractor {
            strategy,
            parsers: Mutex::new(HashMap::new()),
        })
    }

    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Extractor>, ConfigError> {
        let strategy_name = fragment.choice(
            "strategy",
            &["take_first", "take_first_not_null", "take_last", "take_last_not_null", "take_all"],
            Some("take_first"),
        )?;
        let strategy = Strategy::parse(&strategy_name).expect("choice() validated membership");
        JsonPointerExtractor::new(strategy)
            .map(|e| Box::new(e) as Box<dyn Extractor>)
            .map_err(|e| ConfigError::invalid("strategy", e.to_string()))
    }

    fn pointer_for(&self, path: &str) -> std::sync::Arc<Pointer> {
        let mut parsers = self.parsers.lock().unwrap();
        parsers
            .entry(path.to_string())
            .or_insert_with(|| std::sync::Arc::new(Pointer::parse(path)))
            .clone()
    }

    fn query<'v>(&self, pointer: &Pointer, root: &'v Value, path_prefix: &str) -> Vec<(String, &'v Value)> {
        let mut frontier = vec![(path_prefix.to_string(), root)];
        for token in &pointer.0 {
            let mut next = Vec::new();
            for (p, v) in frontier {
                match token {
                    Token::Property(name) => {
                        if let Value::Object(map) = v {
                            if let Some(val) = map.get(name) {
                                next.push((format!("{p}.{name}"), val));
                            }
                        }
                    }
                    Token::Index(i) => {
                        if let Value::Array(arr) = v {
                            if let Some(val) = arr.get(*i) {
                                next.push((format!("{p}[{i}]"), val));
                            }
                        }
                    }
                    Token::Wildcard => match v {
                        Value::Object(map) => {
                            for (k, val) in map {
                                next.push((format!("{p}.{k}"), val));
                            }
                        }
                        Value::Array(arr) => {
                            for (i, val) in arr.iter().enumerate() {
                                next.push((format!("{p}[{i}]"), val));
                            }
                        }
                        _ => {}
                    },
                }
            }
            frontier = next;
        }
        frontier
    }
}

impl Extractor for JsonPointerExtractor {
    fn first_index(&self) -> usize {
        0
    }

    fn extract(&self, path: &str, payload: &[u8]) -> ExtractResult {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to extract from JSON: payload did not parse");
                return ExtractResult::none();
            }
        };
        let pointer = self.pointer_for(path);
        let matches = self.query(&pointer, &value, "$");
        apply_strategy(
            self.strategy,
            matches.into_iter().map(|(p, v)| (p, v.clone())),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn doc() -> Value {
        serde_json::json!({
            "orders": [
                {"id": 1, "total": 9.5},
                {"id": 2, "total": null}
            ]
        })
    }

    #[test]
    fn take_first_walks_index_and_property() {
        let ex = JsonPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".orders[0].id", serde_json::to_vec(&doc()).unwrap().as_slice());
        assert_eq!(r, ExtractResult::One(Some("$.orders[0].id".into()), Some(Value::from(1))));
    }

    #[test]
    fn take_all_over_wildcard_index() {
        let ex = JsonPointerExtractor::new(Strategy::TakeAll).unwrap();
        let r = ex.extract(".orders[*].id", serde_json::to_vec(&doc()).unwrap().as_slice());
        match r {
            ExtractResult::All(paths, values) => {
                assert_eq!(paths, vec!["$.orders[0].id", "$.orders[1].id"]);
                assert_eq!(values, vec![Value::from(1), Value::from(2)]);
            }
            other => panic!("expected All, got {other:?}"),
        }
    }

    #[test]
    fn missing_path_yields_none() {
        let ex = JsonPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".nope", serde_json::to_vec(&doc()).unwrap().as_slice());
        assert_eq!(r, ExtractResult::none());
    }

    #[test]
    fn unparsable_payload_yields_none_not_panic() {
        let ex = JsonPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".orders[0].id", b"not json");
        assert_eq!(r, ExtractResult::none());
    }

    #[test]
    fn take_first_not_null_is_rejected_construction_only_if_unsupported() {
        // all five strategies are supported by this extractor
        assert!(JsonPointerExtractor::new(Strategy::TakeFirstNotNull).is_ok());
    }
}
