use batchout_config::{ConfigError, Fragment, Registry};
use std::sync::OnceLock;

/// A unit of work the Batch runs once per cycle: either a reader (pulls
/// payloads from named inputs, optionally parameterized by a selector over
/// the previous run's scratch data) or a writer (projects the current
/// run's scratch data through a selector into named outputs).
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Reader {
        inputs: Vec<String>,
        selector: Option<String>,
        threads: usize,
    },
    Writer {
        outputs: Vec<String>,
        selector: String,
    },
}

impl Task {
    fn construct_reader(fragment: &Fragment) -> Result<Task, ConfigError> {
        let inputs: Vec<String> = fragment.required("inputs")?;
        let selector: Option<String> = fragment.optional("selector")?;
        let threads: usize = fragment.with_default("threads", 1usize)?;
        if threads == 0 {
            return Err(ConfigError::invalid("threads", "must be at least 1"));
        }
        Ok(Task::Reader { inputs, selector, threads })
    }

    fn construct_writer(fragment: &Fragment) -> Result<Task, ConfigError> {
        let outputs: Vec<String> = fragment.required("outputs")?;
        let selector: String = fragment.required("selector")?;
        Ok(Task::Writer { outputs, selector })
    }
}

pub fn registry() -> &'static Registry<Task> {
    static REGISTRY: OnceLock<Registry<Task>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("task"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let reg = registry();
        reg.bind("reader", Task::construct_reader).expect("default tasks register exactly once");
        reg.bind("writer", Task::construct_writer).expect("default tasks register exactly once");
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reader_defaults_to_one_thread() {
        register_defaults();
        let f = Fragment::from_value(serde_json::json!({"type": "reader", "inputs": ["a"]})).unwrap();
        let task = registry().create(&f).unwrap();
        assert_eq!(task, Task::Reader { inputs: vec!["a".into()], selector: None, threads: 1 });
    }

    #[test]
    fn reader_rejects_zero_threads() {
        register_defaults();
        let f = Fragment::from_value(serde_json::json!({"type": "reader", "inputs": ["a"], "threads": 0})).unwrap();
        assert!(registry().create(&f).is_err());
    }

    #[test]
    fn writer_requires_a_selector() {
        register_defaults();
        let f = Fragment::from_value(serde_json::json!({"type": "writer", "outputs": ["a"]})).unwrap();
        assert!(registry().create(&f).is_err());
    }
}
