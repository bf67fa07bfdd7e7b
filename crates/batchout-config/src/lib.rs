//! Shared config-time plumbing: the component Registry, config Fragment
//! binding helpers, and the error types raised during construction.
//!
//! This crate has no notion of what a "component" is; it's consumed by
//! `batchout-extract`, `batchout-model`, `batchout-io`, and `batchout-core`,
//! each of which defines its own trait objects and Registry instances.

mod error;
mod fragment;
mod registry;

pub use error::ConfigError;
pub use fragment::Fragment;
pub use registry::{Constructor, Registry};
