//! The in-memory relational scratch store (Data) and the SQL Selector that
//! projects rows out of it.

mod error;
mod selector;
mod store;

pub use error::DataError;
pub use selector::{Selector, SqlSelector};
pub use store::{ColumnKind, Data};

pub fn register_defaults() {
    selector::register_defaults();
}

pub fn selector_registry() -> &'static batchout_config::Registry<Box<dyn Selector>> {
    selector::registry()
}
