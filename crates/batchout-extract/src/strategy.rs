use serde_json::Value;

/// The five selection strategies a multi-match extraction can resolve to.
/// Not every extractor supports every strategy; each construction validates
/// its configured strategy against its own supported subset via
/// `Strategy::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    TakeFirst,
    TakeFirstNotNull,
    TakeLast,
    TakeLastNotNull,
    TakeAll,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Strategy> {
        Some(match s {
            "take_first" => Strategy::TakeFirst,
            "take_first_not_null" => Strategy::TakeFirstNotNull,
            "take_last" => Strategy::TakeLast,
            "take_last_not_null" => Strategy::TakeLastNotNull,
            "take_all" => Strategy::TakeAll,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::TakeFirst => "take_first",
            Strategy::TakeFirstNotNull => "take_first_not_null",
            Strategy::TakeLast => "take_last",
            Strategy::TakeLastNotNull => "take_last_not_null",
            Strategy::TakeAll => "take_all",
        }
    }

    /// Checks `self` is one of `allowed`, producing the config error an
    /// extractor's constructor should raise otherwise.
    pub fn validate(self, allowed: &[Strategy]) -> Result<(), crate::error::ExtractError> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(crate::error::ExtractError::UnsupportedStrategy {
                strategy: self.as_str().to_string(),
                choices: allowed
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

/// Outcome of applying a Strategy to a stream of `(matched_path, value)`
/// candidates. `take_all` is the one strategy that doesn't collapse to a
/// single pair, so it gets its own variant rather than forcing everything
/// through a `Vec` of length one.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractResult {
    One(Option<String>, Option<Value>),
    All(Vec<String>, Vec<Value>),
}

impl ExtractResult {
    pub fn none() -> ExtractResult {
        ExtractResult::One(None, None)
    }
}

pub fn apply_strategy(
    strategy: Strategy,
    results: impl Iterator<Item = (String, Value)>,
) -> ExtractResult {
    match strategy {
        Strategy::TakeFirst => {
            for (path, value) in results {
                return ExtractResult::One(Some(path), Some(value));
            }
            ExtractResult::none()
        }
        Strategy::TakeFirstNotNull => {
            for (path, value) in results {
                if !value.is_null() {
                    return ExtractResult::One(Some(path), Some(value));
                }
            }
            ExtractResult::none()
        }
        Strategy::TakeLast => {
            let mut last = None;
            for pair in results {
                last = Some(pair);
            }
            match last {
                Some((path, value)) => ExtractResult::One(Some(path), Some(value)),
                None => ExtractResult::none(),
            }
        }
        Strategy::TakeLastNotNull => {
            let mut last = None;
            for (path, value) in results {
                if !value.is_null() {
                    last = Some((path, value));
                }
            }
            match last {
                Some((path, value)) => ExtractResult::One(Some(path), Some(value)),
                None => ExtractResult::none(),
            }
        }
        Strategy::TakeAll => {
            let (paths, values): (Vec<_>, Vec<_>) = results.unzip();
            ExtractResult::All(paths, values)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pairs() -> Vec<(String, Value)> {
        vec![
            ("a".to_string(), Value::Null),
            ("b".to_string(), Value::from(1)),
            ("c".to_string(), Value::from(2)),
        ]
    }

    #[test]
    fn take_first_returns_first_even_if_null() {
        let r = apply_strategy(Strategy::TakeFirst, pairs().into_iter());
        assert_eq!(r, ExtractResult::One(Some("a".into()), Some(Value::Null)));
    }

    #[test]
    fn take_first_not_null_skips_nulls() {
        let r = apply_strategy(Strategy::TakeFirstNotNull, pairs().into_iter());
        assert_eq!(r, ExtractResult::One(Some("b".into()), Some(Value::from(1))));
    }

    #[test]
    fn take_last_not_null_skips_trailing_nulls() {
        let input = vec![
            ("a".to_string(), Value::from(1)),
            ("b".to_string(), Value::Null),
        ];
        let r = apply_strategy(Strategy::TakeLastNotNull, input.into_iter());
        assert_eq!(r, ExtractResult::One(Some("a".into()), Some(Value::from(1))));
    }

    #[test]
    fn take_all_collects_every_pair() {
        let r = apply_strategy(Strategy::TakeAll, pairs().into_iter());
        assert_eq!(
            r,
            ExtractResult::All(
                vec!["a".into(), "b".into(), "c".into()],
                vec![Value::Null, Value::from(1), Value::from(2)],
            )
        );
    }

    #[test]
    fn empty_input_is_none_for_all_but_take_all() {
        assert_eq!(apply_strategy(Strategy::TakeFirst, std::iter::empty()), ExtractResult::none());
        assert_eq!(
            apply_strategy(Strategy::TakeAll, std::iter::empty()),
            ExtractResult::All(vec![], vec![])
        );
    }
}
