/// Errors raised while assembling or validating a `Batch`. All fatal —
/// construction aborts on the first one, same as the registry/fragment
/// errors they often wrap.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] batchout_config::ConfigError),

    #[error(transparent)]
    Map(#[from] batchout_map::MapError),

    #[error("{kind} \"{name}\" is referenced but was never defined")]
    UndefinedReference { kind: &'static str, name: String },

    #[error("the batch was already run once; components can no longer be added")]
    ChangedAfterFirstRun,
}
