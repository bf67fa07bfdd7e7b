use super::Input;
use crate::error::InputError;
use crate::params::FetchParams;
use batchout_config::{ConfigError, Fragment};

/// Replays a fixed list of payloads, one per `fetch` call, ignoring
/// `params` entirely. Mainly useful for tests and fixtures.
pub struct ConstInput {
    data: Vec<String>,
    position: usize,
}

impl ConstInput {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Input>, ConfigError> {
        let data: Vec<String> = fragment.required("data")?;
        Ok(Box::new(ConstInput { data, position: 0 }))
    }
}

impl Input for ConstInput {
    fn fetch(&mut self, _params: &FetchParams) -> Result<Option<Vec<u8>>, InputError> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let payload = self.data[self.position].clone().into_bytes();
        self.position += 1;
        Ok(Some(payload))
    }

    fn commit(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), InputError> {
        self.position = 0;
        Ok(())
    }

    fn clone_fresh(&self) -> Box<dyn Input> {
        Box::new(ConstInput { data: self.data.clone(), position: 0 })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replays_each_item_once_then_ends() {
        let f = Fragment::from_value(serde_json::json!({"type": "const", "data": ["a", "b"]})).unwrap();
        let mut input = ConstInput::construct(&f).unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"a".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"b".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), None);
    }

    #[test]
    fn reset_replays_from_the_start() {
        let f = Fragment::from_value(serde_json::json!({"type": "const", "data": ["a"]})).unwrap();
        let mut input = ConstInput::construct(&f).unwrap();
        input.fetch(&FetchParams::new()).unwrap();
        input.reset().unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn clone_fresh_starts_over_independently() {
        let f = Fragment::from_value(serde_json::json!({"type": "const", "data": ["a", "b"]})).unwrap();
        let mut input = ConstInput::construct(&f).unwrap();
        input.fetch(&FetchParams::new()).unwrap();
        let mut clone = input.clone_fresh();
        assert_eq!(clone.fetch(&FetchParams::new()).unwrap(), Some(b"a".to_vec()));
    }
}
