//! Index, Column, and Processor: the typed, per-row evaluation layer built
//! atop an Extractor. An Index enumerates repeated substructure in a
//! payload; a Column extracts, processes, and casts a single scalar.

mod column;
mod error;
mod index;
mod processor;
mod value;

pub use column::{Column, DateColumn, DatetimeColumn};
pub use error::ModelError;
pub use index::{Index, IndexForList, IndexForObject, IndexFromList};
pub use processor::Processor;
pub use value::{scalar_is_truthy, scalar_to_string, Bindings, ColumnValue, IndexValue};

/// Binds every reference Index, Column, and Processor. Call once before any
/// config referencing `type: for_list` / `type: string` / `type: replace`
/// (etc.) is parsed.
pub fn register_defaults() {
    index::register_defaults();
    column::register_defaults();
    processor::register_defaults();
}

pub fn index_registry() -> &'static batchout_config::Registry<Box<dyn Index>> {
    index::registry()
}

pub fn column_registry() -> &'static batchout_config::Registry<Box<dyn Column>> {
    column::registry()
}

pub fn processor_registry() -> &'static batchout_config::Registry<Box<dyn Processor>> {
    processor::registry()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_defaults_binds_every_kind() {
        register_defaults();
        assert!(index_registry().is_bound("for_list"));
        assert!(column_registry().is_bound("datetime"));
        assert!(processor_registry().is_bound("replace"));
    }
}
