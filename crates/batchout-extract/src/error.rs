/// ExtractError covers construction-time failures only. Extraction itself
/// never returns an error: a bad path or an unparsable payload degrades to
/// `(None, None)` and a logged warning, matching every other extractor in
/// the std library.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("\"{strategy}\" is not a supported strategy for this extractor; choose one of: {choices}")]
    UnsupportedStrategy { strategy: String, choices: String },

    #[error("invalid regex flags: {0}")]
    InvalidFlags(String),
}
