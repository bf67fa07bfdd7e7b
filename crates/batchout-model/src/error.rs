/// Construction-time failures for Indexes, Columns, and Processors. Runtime
/// cast/extraction failures never produce a `ModelError`: they degrade to
/// `None` plus a logged warning, same as the Extractor contract.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("timezone \"{0}\" is not recognized")]
    InvalidTimezone(String),

    #[error("format is required when parser=custom")]
    CustomFormatRequired,

    #[error("format \"{format}\" is invalid: {message}")]
    InvalidFormat { format: String, message: String },
}
