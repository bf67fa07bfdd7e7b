#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("source \"{0}\" was never registered with with_sources")]
    UnknownSource(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
