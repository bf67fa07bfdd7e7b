use crate::error::ConfigError;
use crate::fragment::Fragment;
use std::collections::HashMap;
use std::sync::Mutex;

/// Constructor builds a component instance of `T` from a validated,
/// env-substituted Fragment. Construction failures are ConfigError.
pub type Constructor<T> = fn(&Fragment) -> Result<T, ConfigError>;

/// Registry is a process-wide table, one per base kind `T`, indexed by
/// type name. It mirrors `batchout.core.registry.Registry`: `bind` records
/// a constructor (duplicate binding is an error), `create` reads the
/// fragment's `type`, looks up the constructor, applies env substitution,
/// and invokes it.
///
/// Rust has no implicit base-class registration, so each kind crate
/// exposes its own `Registry<Box<dyn Trait>>` and a `register_defaults()`
/// function that binds its concrete types explicitly; `Batch::new` calls
/// every kind's `register_defaults()` once before any config is parsed.
pub struct Registry<T> {
    kind: &'static str,
    bound: Mutex<HashMap<String, Constructor<T>>>,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Registry {
            kind,
            bound: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `name` to `ctor`. Binding the same name twice is an error,
    /// even across repeated `register_defaults()` calls, so callers
    /// should guard re-registration themselves if they need idempotency
    /// (the Batch does, via a `std::sync::Once`).
    pub fn bind(&self, name: &'static str, ctor: Constructor<T>) -> Result<(), ConfigError> {
        let mut bound = self.bound.lock().unwrap();
        if bound.contains_key(name) {
            return Err(ConfigError::ClassAlreadyBound {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        bound.insert(name.to_string(), ctor);
        Ok(())
    }

    pub fn create(&self, fragment: &Fragment) -> Result<T, ConfigError> {
        let type_name = fragment.type_name()?;
        let ctor = {
            let bound = self.bound.lock().unwrap();
            bound.get(type_name).copied()
        };
        let ctor = ctor.ok_or_else(|| ConfigError::UnknownType {
            kind: self.kind,
            name: type_name.to_string(),
        })?;
        let fragment = fragment.clone().with_env_substitution()?;
        ctor(&fragment)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bound.lock().unwrap().contains_key(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_one(_f: &Fragment) -> Result<i32, ConfigError> {
        Ok(42)
    }

    #[test]
    fn bind_then_create() {
        let reg: Registry<i32> = Registry::new("widget");
        reg.bind("one", make_one).unwrap();

        let frag = Fragment::from_value(serde_json::json!({"type": "one"})).unwrap();
        assert_eq!(reg.create(&frag).unwrap(), 42);
    }

    #[test]
    fn duplicate_bind_is_error() {
        let reg: Registry<i32> = Registry::new("widget");
        reg.bind("one", make_one).unwrap();
        assert!(matches!(
            reg.bind("one", make_one),
            Err(ConfigError::ClassAlreadyBound { .. })
        ));
    }

    #[test]
    fn unknown_type_is_error() {
        let reg: Registry<i32> = Registry::new("widget");
        let frag = Fragment::from_value(serde_json::json!({"type": "nope"})).unwrap();
        assert!(matches!(reg.create(&frag), Err(ConfigError::UnknownType { .. })));
    }

    #[test]
    fn missing_type_is_error() {
        let reg: Registry<i32> = Registry::new("widget");
        let frag = Fragment::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(reg.create(&frag), Err(ConfigError::TypeMissing)));
    }
}
