//! The Map compiler and Walker: turns a source's declarative map literal
//! into an ordered list of branches, then walks a payload through them to
//! produce typed rows.
//!
//! There's no standalone "Map" object in the original system this was
//! distilled from — `compile` and `Walker` together replace the Cartesian
//! `product(*indexes.values())` loop its batch runner builds inline, made
//! explicit here so it can be unit tested apart from the orchestrator.

mod compile;
mod error;
mod walker;

pub use compile::{compile, parse_literal, well_ordered, Branch, MapNode, Step, StepKind};
pub use error::MapError;
pub use walker::Walker;
