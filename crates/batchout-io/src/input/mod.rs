mod const_input;
mod file;
mod http;

pub use const_input::ConstInput;
pub use file::FileInput;
pub use http::HttpInput;

use crate::error::InputError;
use crate::params::FetchParams;
use batchout_config::Registry;
use std::sync::OnceLock;

/// A source of raw payloads. `fetch` is called repeatedly with the same
/// `params` tuple until it returns `Ok(None)`, which ends the round for
/// this input; implementations are not expected to be thread-safe, which
/// is why a reader worker calls `clone_fresh` rather than sharing one
/// instance across threads.
pub trait Input: Send {
    fn fetch(&mut self, params: &FetchParams) -> Result<Option<Vec<u8>>, InputError>;
    fn commit(&mut self) -> Result<(), InputError>;
    fn reset(&mut self) -> Result<(), InputError>;
    fn clone_fresh(&self) -> Box<dyn Input>;
}

pub fn registry() -> &'static Registry<Box<dyn Input>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Input>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("input"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("const", const_input::ConstInput::construct).expect("default inputs register exactly once");
        reg.bind("file", file::FileInput::construct).expect("default inputs register exactly once");
        reg.bind("http", http::HttpInput::construct).expect("default inputs register exactly once");
    });
}
