#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{field} is missing")]
    ConfigInvalid { field: &'static str, message: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("response status {status}: {body}")]
    BadResponse { status: u16, body: String },

    #[error(transparent)]
    Config(#[from] batchout_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InputError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        InputError::ConfigInvalid { field, message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error(transparent)]
    Config(#[from] batchout_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
