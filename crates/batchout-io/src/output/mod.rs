mod csv_output;
mod logger;

pub use csv_output::CsvOutput;
pub use logger::LoggerOutput;

use crate::error::OutputError;
use batchout_config::Registry;
use batchout_model::ColumnValue;
use std::sync::OnceLock;

/// A sink for the rows a writer task projects out of the scratch store.
/// `ingest` is called once per writer-task/output pair per run, followed
/// by `commit` to finalize any buffered writes.
pub trait Output: Send {
    fn ingest(&mut self, columns: &[String], rows: &[Vec<Option<ColumnValue>>]) -> Result<usize, OutputError>;
    fn commit(&mut self) -> Result<(), OutputError>;
}

/// Renders a cell the way both reference outputs need it: empty string for
/// null, otherwise the value's plain text form.
pub(crate) fn render_cell(value: &Option<ColumnValue>) -> String {
    match value {
        None => String::new(),
        Some(ColumnValue::String(s)) => s.clone(),
        Some(ColumnValue::Integer(i)) => i.to_string(),
        Some(ColumnValue::Float(f)) => f.to_string(),
        Some(ColumnValue::Boolean(b)) => b.to_string(),
        Some(ColumnValue::Date(d)) => d.to_string(),
        Some(ColumnValue::Datetime(dt)) => dt.to_rfc3339(),
    }
}

pub fn registry() -> &'static Registry<Box<dyn Output>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Output>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("output"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("csv", csv_output::CsvOutput::construct).expect("default outputs register exactly once");
        reg.bind("logger", logger::LoggerOutput::construct).expect("default outputs register exactly once");
    });
}
