use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;

/// Fragment is an unordered config mapping carrying a required `type`
/// discriminator plus arbitrary recognized options. It's the unit the
/// Registry hands to a component constructor.
#[derive(Debug, Clone, Default)]
pub struct Fragment(serde_json::Map<String, Value>);

impl Fragment {
    pub fn new(map: serde_json::Map<String, Value>) -> Self {
        Fragment(map)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Fragment(map)),
            _ => Err(ConfigError::invalid("<fragment>", "expected a mapping")),
        }
    }

    /// Merge `defaults` underneath this fragment: keys already present in
    /// `self` win. Mirrors `c.update(self._defaults.get(...))` applied to a
    /// copy of the per-kind default fragment, then overridden by the
    /// user's own fragment.
    pub fn merged_over_defaults(mut self, defaults: &Fragment) -> Self {
        for (k, v) in &defaults.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self
    }

    pub fn type_name(&self) -> Result<&str, ConfigError> {
        match self.0.get("type") {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) | None => Err(ConfigError::TypeMissing),
        }
    }

    fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Apply `from_env: {field: ENV_NAME}` substitution in place, consuming
    /// the `from_env` key. A field is replaced from the environment when
    /// the named variable is set; otherwise the field is left untouched
    /// *if* it already has a value in the fragment, and an error is raised
    /// only when neither the environment nor the fragment supplies it.
    pub fn with_env_substitution(mut self) -> Result<Self, ConfigError> {
        let Some(from_env) = self.0.remove("from_env") else {
            return Ok(self);
        };
        let Value::Object(mapping) = from_env else {
            return Err(ConfigError::FromEnvNotMapping);
        };
        for (field, env_name) in mapping {
            let env_name = match env_name {
                Value::String(s) => s,
                other => other.to_string(),
            };
            match env::var(&env_name) {
                Ok(value) => {
                    self.0.insert(field, Value::String(value));
                }
                Err(_) => {
                    let has_existing = self
                        .0
                        .get(&field)
                        .map(|v| !v.is_null())
                        .unwrap_or(false);
                    if !has_existing {
                        return Err(ConfigError::EnvVarMissing(env_name));
                    }
                }
            }
        }
        Ok(self)
    }

    /// Read a required option, failing if absent or null.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        match self.raw(key) {
            None => Err(ConfigError::Required { key: key.to_string() }),
            Some(Value::Null) => Err(ConfigError::Null { key: key.to_string() }),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| ConfigError::invalid(key, e.to_string())),
        }
    }

    /// Read an optional option; `None` if absent or explicitly null.
    pub fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.raw(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| ConfigError::invalid(key, e.to_string())),
        }
    }

    /// Read an option, falling back to `default` when absent or null.
    pub fn with_default<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.optional(key)?.unwrap_or(default))
    }

    /// Read a string option and enforce it's one of `choices`.
    pub fn choice(&self, key: &str, choices: &[&str], default: Option<&str>) -> Result<String, ConfigError> {
        let value: Option<String> = self.optional(key)?;
        let value = match value.or_else(|| default.map(str::to_string)) {
            Some(v) => v,
            None => return Err(ConfigError::Required { key: key.to_string() }),
        };
        if !choices.iter().any(|c| *c == value) {
            return Err(ConfigError::choice_not_supported(key, value, choices));
        }
        Ok(value)
    }

    pub fn raw_map(&self) -> &serde_json::Map<String, Value> {
        &self.0
    }
}
