use std::fmt;

/// ConfigError covers every way a component's configuration fragment can be
/// rejected, either by the Registry itself or by a component's own binder.
/// All variants are fatal: callers are expected to abort construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("fragment is missing required \"type\" discriminator")]
    TypeMissing,

    #[error("type \"{name}\" of {kind} is not bound to any constructor")]
    UnknownType { kind: &'static str, name: String },

    #[error("type \"{name}\" of {kind} is already bound")]
    ClassAlreadyBound { kind: &'static str, name: String },

    #[error("{key} is missing")]
    Required { key: String },

    #[error("{key} is null")]
    Null { key: String },

    #[error("\"{value}\" is not supported for \"{key}\"; choose one of: {choices}")]
    ChoiceNotSupported {
        key: String,
        value: String,
        choices: JoinedChoices,
    },

    #[error("from_env is not a mapping")]
    FromEnvNotMapping,

    #[error("environment variable {0} is not set")]
    EnvVarMissing(String),

    #[error("{key}: {message}")]
    Invalid { key: String, message: String },
}

/// Wrapper so the comma-joined choice list can be rendered lazily in the
/// Display impl above without allocating a String at every call site.
#[derive(Debug)]
pub struct JoinedChoices(pub String);

impl fmt::Display for JoinedChoices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ConfigError {
    pub fn choice_not_supported(key: impl Into<String>, value: impl Into<String>, choices: &[&str]) -> Self {
        ConfigError::ChoiceNotSupported {
            key: key.into(),
            value: value.into(),
            choices: JoinedChoices(choices.join(", ")),
        }
    }

    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}
