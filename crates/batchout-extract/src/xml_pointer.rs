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

/// Extracts from an XML payload using the same `.prop[N]` path grammar as
/// `JsonPointerExtractor`, walking element children by tag name. Indices
/// follow XPath's 1-based convention (`[1]` is the first child), hence
/// `first_index() == 1`; a trailing `@attr` segment reads an attribute
/// instead of the matched element's text content.
pub struct XmlPointerExtractor {
    strategy: Strategy,
    parsers: Mutex<HashMap<String, std::sync::Arc<Pointer>>>,
}

impl XmlPointerExtractor {
    pub fn new(strategy: Strategy) -> Result<Self, ExtractError> {
        strategy.validate(ALLOWED)?;
        Ok(XmlPointerExtractor {
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
        XmlPointerExtractor::new(strategy)
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

    fn query<'d>(
        &self,
        pointer: &Pointer,
        root: roxmltree::Node<'d, 'd>,
        path_prefix: &str,
    ) -> Vec<(String, roxmltree::Node<'d, 'd>)> {
        let mut frontier = vec![(path_prefix.to_string(), root)];
        for token in &pointer.0 {
            let mut next = Vec::new();
            for (p, node) in frontier {
                match token {
                    Token::Property(name) => {
                        for child in node.children().filter(|c| c.is_element() && c.tag_name().name() == name) {
                            next.push((format!("{p}/{name}"), child));
                        }
                    }
                    Token::Index(i) => {
                        // 1-based: [1] is the first element child, matching first_index().
                        if let Some(child) = node.children().filter(|c| c.is_element()).nth(i.saturating_sub(1)) {
                            next.push((format!("{p}[{i}]"), child));
                        }
                    }
                    Token::Wildcard => {
                        for child in node.children().filter(|c| c.is_element()) {
                            next.push((format!("{p}/{}", child.tag_name().name()), child));
                        }
                    }
                }
            }
            frontier = next;
        }
        frontier
    }
}

impl Extractor for XmlPointerExtractor {
    fn first_index(&self) -> usize {
        1
    }

    fn extract(&self, path: &str, payload: &[u8]) -> ExtractResult {
        let text = match std::str::from_utf8(payload) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to extract from XML: payload is not utf-8");
                return ExtractResult::none();
            }
        };
        let doc = match roxmltree::Document::parse(text) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to extract from XML: payload did not parse");
                return ExtractResult::none();
            }
        };
        let (path, attr) = match path.split_once('@') {
            Some((p, a)) => (p, Some(a)),
            None => (path, None),
        };
        let pointer = self.pointer_for(path);
        let matches = self.query(&pointer, doc.root_element(), "");
        let pairs = matches.into_iter().filter_map(|(p, node)| {
            let value = match attr {
                Some(name) => node.attribute(name).map(|s| s.to_string()),
                None => node.text().map(|s| s.to_string()),
            };
            value.map(|v| (p, Value::String(v)))
        });
        apply_strategy(self.strategy, pairs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const XML: &str = r#"<order id="a1">
        <item qty="2">widget</item>
        <item qty="5">gadget</item>
    </order>"#;

    #[test]
    fn take_first_reads_text_of_first_indexed_child() {
        let ex = XmlPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".item[1]", XML.as_bytes());
        assert_eq!(r, ExtractResult::One(Some("/item[1]".into()), Some(Value::String("widget".into()))));
    }

    #[test]
    fn second_indexed_child_is_index_two_not_one() {
        let ex = XmlPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".item[2]", XML.as_bytes());
        assert_eq!(r, ExtractResult::One(Some("/item[2]".into()), Some(Value::String("gadget".into()))));
    }

    #[test]
    fn attribute_suffix_reads_attribute_not_text() {
        let ex = XmlPointerExtractor::new(Strategy::TakeAll).unwrap();
        let r = ex.extract(".item[*]@qty", XML.as_bytes());
        match r {
            ExtractResult::All(_, values) => {
                assert_eq!(values, vec![Value::String("2".into()), Value::String("5".into())]);
            }
            other => panic!("expected All, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_payload_yields_none() {
        let ex = XmlPointerExtractor::new(Strategy::TakeFirst).unwrap();
        let r = ex.extract(".item[1]", b"<not-xml");
        assert_eq!(r, ExtractResult::none());
    }
}
