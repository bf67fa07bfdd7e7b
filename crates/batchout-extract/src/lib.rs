//! The Extractor contract, multi-match strategies, and the three reference
//! extractors (JSON-pointer, XML-pointer, regex) that ship with the core.

mod error;
mod json_pointer;
mod pointer;
mod regex_extractor;
mod strategy;
mod xml_pointer;

pub use error::ExtractError;
pub use json_pointer::JsonPointerExtractor;
pub use regex_extractor::RegexExtractor;
pub use strategy::{ExtractResult, Strategy};
pub use xml_pointer::XmlPointerExtractor;

use batchout_config::Registry;
use std::sync::OnceLock;

/// Pulls `(matched_path, value)` (or every match, for `take_all`) out of a
/// raw payload at a given path. Implementations never propagate extraction
/// failures as errors: a bad path or an unparsable payload degrades to
/// `ExtractResult::none()` plus a logged warning.
pub trait Extractor: Send + Sync {
    /// Base index used when an Index enumerates a list this extractor's
    /// paths address (0 for JSON/regex, 1 for XML's XPath-style indexing).
    fn first_index(&self) -> usize;

    fn extract(&self, path: &str, payload: &[u8]) -> ExtractResult;
}

/// Process-wide registry of bound Extractor constructors, keyed by type name.
pub fn registry() -> &'static Registry<Box<dyn Extractor>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Extractor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("extractor"))
}

/// Binds the three reference extractors. Idempotent: repeated calls after
/// the first are no-ops, since `Registry::bind` would otherwise error on
/// rebinding the same name.
pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("json_pointer", |f| json_pointer::JsonPointerExtractor::construct(f))
            .expect("default extractors register exactly once");
        reg.bind("xml_pointer", |f| xml_pointer::XmlPointerExtractor::construct(f))
            .expect("default extractors register exactly once");
        reg.bind("regex", |f| regex_extractor::RegexExtractor::construct(f))
            .expect("default extractors register exactly once");
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_defaults_is_idempotent_and_binds_all_three() {
        register_defaults();
        register_defaults();
        assert!(registry().is_bound("json_pointer"));
        assert!(registry().is_bound("xml_pointer"));
        assert!(registry().is_bound("regex"));
    }
}
