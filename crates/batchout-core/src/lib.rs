//! Ties every other crate together: `Task` (what runs each cycle) and
//! `Batch` (the assembled pipeline, built from a config document and
//! driven by `run_once`/`run_forever`).

mod batch;
mod defaults;
mod error;
mod task;
mod worker;

pub use batch::Batch;
pub use error::BatchError;
pub use task::Task;
