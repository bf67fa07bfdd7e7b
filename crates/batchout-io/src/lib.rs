//! The boundary of the pipeline: `Input` adapters that produce raw
//! payloads and `Output` adapters that consume projected rows.

mod error;
mod input;
mod output;
mod params;

pub use error::{InputError, OutputError};
pub use input::{register_defaults as register_default_inputs, registry as input_registry, ConstInput, FileInput, HttpInput, Input};
pub use output::{register_defaults as register_default_outputs, registry as output_registry, CsvOutput, LoggerOutput, Output};
pub use params::{FetchParams, ParamValue};

/// Binds every reference Input and Output. Call once before any config
/// naming `type: const` / `type: file` / `type: http` / `type: csv` /
/// `type: logger` is parsed.
pub fn register_defaults() {
    input::register_defaults();
    output::register_defaults();
}
