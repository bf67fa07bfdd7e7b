use batchout_config::Fragment;
use serde_json::Value;

/// The top-level `defaults` document: a mapping from component-kind plural
/// alias (`inputs`, `columns`, ...) to a default fragment, merged under
/// every instance fragment of that kind during construction.
#[derive(Debug, Clone, Default)]
pub struct Defaults(serde_json::Map<String, Value>);

impl Defaults {
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Defaults(map),
            _ => Defaults(serde_json::Map::new()),
        }
    }

    /// The default fragment for one component kind (`"columns"`, `"inputs"`,
    /// ...), or an empty fragment if the defaults document names none.
    pub fn for_kind(&self, kind: &str) -> Fragment {
        match self.0.get(kind) {
            Some(Value::Object(map)) => Fragment::new(map.clone()),
            _ => Fragment::new(serde_json::Map::new()),
        }
    }
}
