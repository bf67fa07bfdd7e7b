use crate::defaults::Defaults;
use crate::task::Task;
use crate::worker::read_one;
use batchout_config::Fragment;
use batchout_data::{ColumnKind, Data, Selector};
use batchout_extract::Extractor;
use batchout_io::{FetchParams, Input, Output};
use batchout_map::{Branch, Walker};
use batchout_model::{Column, ColumnValue, Index};
use indexmap::IndexMap;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BatchError;

fn register_all_defaults() {
    batchout_extract::register_defaults();
    batchout_model::register_defaults();
    batchout_data::register_defaults();
    batchout_io::register_defaults();
    crate::task::register_defaults();
}

fn entries(section: Option<&Value>) -> Vec<(String, Value)> {
    match section {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Vec::new(),
    }
}

fn column_kind_for(type_name: &str) -> Option<ColumnKind> {
    match type_name {
        "string" => Some(ColumnKind::String),
        "integer" => Some(ColumnKind::Integer),
        "float" => Some(ColumnKind::Float),
        "boolean" => Some(ColumnKind::Boolean),
        "date" => Some(ColumnKind::Date),
        "datetime" => Some(ColumnKind::Datetime),
        _ => None,
    }
}

/// The whole declarative pipeline, assembled from a config document: every
/// named component plus the tasks that drive them each run. Built once via
/// `from_config`, then run repeatedly with `run_once`/`run_forever`.
pub struct Batch {
    inputs: IndexMap<String, Box<dyn Input>>,
    extractors: Arc<HashMap<String, Box<dyn Extractor>>>,
    indexes: Arc<HashMap<String, Box<dyn Index>>>,
    columns: Arc<IndexMap<String, Box<dyn Column>>>,
    column_kinds: Arc<HashMap<String, ColumnKind>>,
    outputs: IndexMap<String, Box<dyn Output>>,
    selectors: HashMap<String, Box<dyn Selector>>,
    maps: Arc<HashMap<String, Vec<Branch>>>,
    tasks: Vec<Task>,
    defaults: Defaults,
    data: Data,
    ran: bool,
}

impl Batch {
    fn new(defaults: Defaults) -> Batch {
        Batch {
            inputs: IndexMap::new(),
            extractors: Arc::new(HashMap::new()),
            indexes: Arc::new(HashMap::new()),
            columns: Arc::new(IndexMap::new()),
            column_kinds: Arc::new(HashMap::new()),
            outputs: IndexMap::new(),
            selectors: HashMap::new(),
            maps: Arc::new(HashMap::new()),
            tasks: Vec::new(),
            defaults,
            data: Data::new(Vec::new(), HashMap::new()),
            ran: false,
        }
    }

    fn guard_mutable(&self) -> Result<(), BatchError> {
        if self.ran {
            return Err(BatchError::ChangedAfterFirstRun);
        }
        Ok(())
    }

    /// Builds a Batch from a config document and its `defaults` mapping,
    /// wiring every component kind in turn and validating cross-references
    /// before handing it back ready to run.
    pub fn from_config(cfg: &Value, defaults: &Value) -> Result<Batch, BatchError> {
        register_all_defaults();
        let mut batch = Batch::new(Defaults::from_value(Some(defaults.clone())));
        batch = batch.with_inputs(cfg.get("inputs"))?;
        batch = batch.with_extractors(cfg.get("extractors"))?;
        batch = batch.with_indexes(cfg.get("indexes"))?;
        batch = batch.with_columns(cfg.get("columns"))?;
        batch = batch.with_outputs(cfg.get("outputs"))?;
        batch = batch.with_selectors(cfg.get("selectors"))?;
        batch = batch.with_tasks(cfg.get("tasks"))?;
        batch = batch.with_maps(cfg.get("maps"))?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn with_inputs(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("inputs");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let input = batchout_io::input_registry().create(&fragment)?;
            self.inputs.insert(name, input);
        }
        Ok(self)
    }

    pub fn with_extractors(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("extractors");
        let built = Arc::get_mut(&mut self.extractors).expect("sole owner during construction");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let extractor = batchout_extract::registry().create(&fragment)?;
            built.insert(name, extractor);
        }
        Ok(self)
    }

    pub fn with_indexes(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("indexes");
        let built = Arc::get_mut(&mut self.indexes).expect("sole owner during construction");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let index = batchout_model::index_registry().create(&fragment)?;
            built.insert(name, index);
        }
        Ok(self)
    }

    pub fn with_columns(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("columns");
        let columns = Arc::get_mut(&mut self.columns).expect("sole owner during construction");
        let kinds = Arc::get_mut(&mut self.column_kinds).expect("sole owner during construction");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let type_name = fragment.type_name()?.to_string();
            let column = batchout_model::column_registry().create(&fragment)?;
            if let Some(kind) = column_kind_for(&type_name) {
                kinds.insert(name.clone(), kind);
            }
            columns.insert(name, column);
        }
        Ok(self)
    }

    pub fn with_outputs(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("outputs");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let output = batchout_io::output_registry().create(&fragment)?;
            self.outputs.insert(name, output);
        }
        Ok(self)
    }

    pub fn with_selectors(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("selectors");
        for (name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let selector = batchout_data::selector_registry().create(&fragment)?;
            self.selectors.insert(name, selector);
        }
        Ok(self)
    }

    pub fn with_tasks(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let defaults = self.defaults.for_kind("tasks");
        for (_name, value) in entries(section) {
            let fragment = Fragment::from_value(value)?.merged_over_defaults(&defaults);
            let task = crate::task::registry().create(&fragment)?;
            self.tasks.push(task);
        }
        Ok(self)
    }

    /// Parses and compiles every source's map literal. Unlike the other
    /// `with_*` steps this has no registry: a map is a literal structure,
    /// not a typed, `type`-discriminated component.
    pub fn with_maps(mut self, section: Option<&Value>) -> Result<Self, BatchError> {
        self.guard_mutable()?;
        let built = Arc::get_mut(&mut self.maps).expect("sole owner during construction");
        for (name, value) in entries(section) {
            let nodes = batchout_map::parse_literal(&value)?;
            built.insert(name, batchout_map::compile(&nodes));
        }
        let columns: Vec<String> = self.columns.keys().cloned().collect();
        self.data = Data::new(columns, (*self.column_kinds).clone());
        Ok(self)
    }

    /// Every task reference (selector, inputs, outputs) must resolve, as
    /// must every column/index's declared extractor. Run once, right
    /// after construction.
    pub fn validate(&self) -> Result<(), BatchError> {
        for index in self.indexes.values() {
            if !self.extractors.contains_key(index.extractor_name()) {
                return Err(BatchError::UndefinedReference { kind: "extractor", name: index.extractor_name().to_string() });
            }
        }
        for column in self.columns.values() {
            if !self.extractors.contains_key(column.extractor_name()) {
                return Err(BatchError::UndefinedReference { kind: "extractor", name: column.extractor_name().to_string() });
            }
        }
        for task in &self.tasks {
            match task {
                Task::Reader { inputs, selector, .. } => {
                    for name in inputs {
                        if !self.inputs.contains_key(name) {
                            return Err(BatchError::UndefinedReference { kind: "input", name: name.clone() });
                        }
                    }
                    if let Some(name) = selector {
                        if !self.selectors.contains_key(name) {
                            return Err(BatchError::UndefinedReference { kind: "selector", name: name.clone() });
                        }
                    }
                }
                Task::Writer { outputs, selector } => {
                    for name in outputs {
                        if !self.outputs.contains_key(name) {
                            return Err(BatchError::UndefinedReference { kind: "output", name: name.clone() });
                        }
                    }
                    if !self.selectors.contains_key(selector) {
                        return Err(BatchError::UndefinedReference { kind: "selector", name: selector.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    /// Every reader task, in selector-name order with the selector-less
    /// tasks first — matching the empty string sorting before any real
    /// name. Returns owned clones so the dispatch loop below is free to
    /// mutate `self` (inputs, scratch data) while iterating.
    fn reader_tasks_in_order(&self) -> Vec<Task> {
        let mut readers: Vec<Task> = self.tasks.iter().filter(|t| matches!(t, Task::Reader { .. })).cloned().collect();
        readers.sort_by_key(|t| match t {
            Task::Reader { selector, .. } => selector.clone().unwrap_or_default(),
            Task::Writer { .. } => unreachable!(),
        });
        readers
    }

    /// Runs one full cycle: reads via every reader task (parameterized by
    /// the previous run's selections), then writes via every writer task
    /// over the freshly populated scratch store.
    pub async fn run_once(&mut self) -> anyhow::Result<()> {
        let _span = tracing::info_span!("run").entered();

        let mut selections_to_read: HashMap<Option<String>, (Vec<String>, Vec<Vec<Option<ColumnValue>>>)> = HashMap::new();
        for task in &self.tasks {
            if let Task::Reader { selector: Some(name), .. } = task {
                if selections_to_read.contains_key(&Some(name.clone())) {
                    continue;
                }
                let selector = self
                    .selectors
                    .get(name)
                    .ok_or_else(|| BatchError::UndefinedReference { kind: "selector", name: name.clone() })?;
                let rows = selector.apply(&mut self.data)?;
                let rows: Vec<_> = rows.into_iter().filter(|r| r.iter().any(Option::is_some)).collect();
                selections_to_read.insert(Some(name.clone()), (selector.columns().to_vec(), rows));
            }
        }

        self.data.reset();
        let mut source_names: Vec<String> = Vec::new();
        for task in &self.tasks {
            if let Task::Reader { inputs, .. } = task {
                for name in inputs {
                    if !source_names.contains(name) {
                        source_names.push(name.clone());
                    }
                }
            }
        }
        self.data.with_sources(&source_names)?;

        for task in self.reader_tasks_in_order() {
            let Task::Reader { inputs: input_names, selector, threads } = task else { unreachable!() };
            let _task_span = tracing::info_span!("reader_task", threads).entered();

            let (pkeys, pvals_set) = match selector {
                Some(name) => selections_to_read.get(&Some(name)).cloned().unwrap_or((Vec::new(), vec![Vec::new()])),
                None => (Vec::new(), vec![Vec::new()]),
            };

            let semaphore = Arc::new(tokio::sync::Semaphore::new(threads.max(1)));
            let mut handles = Vec::with_capacity(pvals_set.len());
            for pvals in pvals_set {
                let params = FetchParams::from_row(&pkeys, &pvals);
                let cloned_inputs: Vec<(String, Box<dyn Input>)> = input_names
                    .iter()
                    .map(|name| {
                        self.inputs
                            .get(name)
                            .map(|input| (name.clone(), input.clone_fresh()))
                            .ok_or_else(|| BatchError::UndefinedReference { kind: "input", name: name.clone() })
                    })
                    .collect::<Result<_, _>>()?;

                let columns = Arc::clone(&self.columns);
                let column_kinds = Arc::clone(&self.column_kinds);
                let indexes = Arc::clone(&self.indexes);
                let extractors = Arc::clone(&self.extractors);
                let maps = Arc::clone(&self.maps);
                let sem = Arc::clone(&semaphore);

                handles.push(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.expect("semaphore is never closed");
                    tokio::task::spawn_blocking(move || read_one(cloned_inputs, params, columns, column_kinds, indexes, extractors, maps))
                        .await
                        .expect("reader worker panicked")
                }));
            }

            for handle in futures::future::join_all(handles).await {
                let (params, per_source) = handle.expect("reader task panicked")?;
                for (source, rows) in per_source {
                    let count = rows.len();
                    for row in rows {
                        self.data.with_row(&source, row)?;
                    }
                    tracing::info!(input = %source, rows = count, ?params, "fetched rows");
                }
            }

            for name in input_names {
                if let Some(input) = self.inputs.get_mut(name) {
                    input.reset()?;
                }
            }
        }

        for task in &self.tasks {
            if let Task::Writer { outputs, selector: selector_name } = task {
                let (columns, rows) = {
                    let selector = self
                        .selectors
                        .get(selector_name)
                        .ok_or_else(|| BatchError::UndefinedReference { kind: "selector", name: selector_name.clone() })?;
                    let columns = selector.columns().to_vec();
                    let rows = selector.apply(&mut self.data)?;
                    (columns, rows)
                };
                for output_name in outputs {
                    let output = self
                        .outputs
                        .get_mut(output_name)
                        .ok_or_else(|| BatchError::UndefinedReference { kind: "output", name: output_name.clone() })?;
                    output.ingest(&columns, &rows)?;
                    output.commit()?;
                }
            }
        }

        for input in self.inputs.values_mut() {
            input.commit()?;
        }

        self.ran = true;
        tracing::info!(rows = self.data.len(), "run completed");
        Ok(())
    }

    /// Runs `run_once` up to `max_runs` times (-1 = unbounded), sleeping
    /// `min_wait + rand() * max_wait` between runs. Stops immediately (no
    /// retry) if a run fails.
    pub async fn run_forever(&mut self, max_runs: i64, min_wait: Duration, max_wait: Duration) -> anyhow::Result<()> {
        let mut completed: i64 = 0;
        loop {
            if max_runs >= 0 && completed >= max_runs {
                return Ok(());
            }
            self.run_once().await?;
            completed += 1;
            if max_runs >= 0 && completed >= max_runs {
                return Ok(());
            }
            let jitter = rand::thread_rng().gen_range(0.0..1.0);
            let wait = min_wait + Duration::from_secs_f64(jitter * max_wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn config(csv_path: &std::path::Path) -> Value {
        json!({
            "inputs": {"src": {"type": "const", "data": ["{\"id\":1}", "{\"id\":2}"]}},
            "extractors": {"json_pointer": {"type": "json_pointer"}},
            "columns": {"id": {"type": "integer", "path": ".id", "extractor": "json_pointer"}},
            "outputs": {"out": {"type": "csv", "path": csv_path.to_string_lossy(), "mode": "overwrite"}},
            "selectors": {"all": {"type": "sql", "columns": ["id"], "query": "SELECT id FROM \"src\" ORDER BY id;"}},
            "tasks": {
                "read": {"type": "reader", "inputs": ["src"]},
                "write": {"type": "writer", "outputs": ["out"], "selector": "all"},
            },
            "maps": {"src": ["id"]},
        })
    }

    #[test]
    fn undefined_input_reference_fails_validation() {
        let cfg = json!({
            "tasks": {"read": {"type": "reader", "inputs": ["nope"]}},
        });
        assert!(Batch::from_config(&cfg, &json!({})).is_err());
    }

    #[test]
    fn undefined_selector_reference_fails_validation() {
        let cfg = json!({
            "outputs": {"out": {"type": "logger"}},
            "tasks": {"write": {"type": "writer", "outputs": ["out"], "selector": "nope"}},
        });
        assert!(Batch::from_config(&cfg, &json!({})).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutating_components_after_the_first_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let cfg = config(&path);
        let mut batch = Batch::from_config(&cfg, &json!({})).unwrap();
        batch.run_once().await.unwrap();
        assert!(matches!(batch.with_inputs(Some(&json!({}))), Err(BatchError::ChangedAfterFirstRun)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_once_reads_const_input_and_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let cfg = config(&path);
        let mut batch = Batch::from_config(&cfg, &json!({})).unwrap();
        batch.run_once().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "id\n1\n2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_run_starts_from_a_reset_scratch_store() {
        // Each reader worker fetches from a fresh `clone_fresh()` of the
        // input, so a stateless source like `const` replays identically
        // every run. What this test guards is that the scratch store
        // itself doesn't accumulate rows across runs: if it did, the
        // second run's selector would see 4 rows, not 2.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let cfg = config(&path);
        let mut batch = Batch::from_config(&cfg, &json!({})).unwrap();
        batch.run_once().await.unwrap();
        batch.run_once().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "id\n1\n2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn selector_driven_reader_task_is_parameterized_by_the_previous_runs_rows() {
        // "files" is read by id, with the ids coming from whatever "seed"
        // held at the *start* of the run -- i.e. the previous run's output.
        // The first run_once sees an empty scratch store, so "files" stays
        // empty; the second sees the ids ingested by the first and actually
        // opens 1.txt/2.txt, exercising a two-thread parameterized fetch.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.txt"), br#"{"name":"a"}"#).unwrap();
        std::fs::write(dir.path().join("2.txt"), br#"{"name":"b"}"#).unwrap();
        let out_path = dir.path().join("out.csv");
        let file_template = format!("{}/{{id}}.txt", dir.path().to_string_lossy());

        let cfg = json!({
            "inputs": {
                "seed": {"type": "const", "data": ["{\"id\":1}", "{\"id\":2}"]},
                "files": {"type": "file", "path": file_template},
            },
            "extractors": {"json_pointer": {"type": "json_pointer"}},
            "columns": {
                "id": {"type": "integer", "path": ".id", "extractor": "json_pointer"},
                "name": {"type": "string", "path": ".name", "extractor": "json_pointer"},
            },
            "outputs": {"out": {"type": "csv", "path": out_path.to_string_lossy(), "mode": "overwrite"}},
            "selectors": {
                "seed_ids": {"type": "sql", "columns": ["id"], "query": "SELECT id FROM \"seed\";"},
                "all_names": {"type": "sql", "columns": ["name"], "query": "SELECT name FROM \"files\" ORDER BY name;"},
            },
            "tasks": {
                "read_seed": {"type": "reader", "inputs": ["seed"]},
                "read_files": {"type": "reader", "inputs": ["files"], "selector": "seed_ids", "threads": 2},
                "write": {"type": "writer", "outputs": ["out"], "selector": "all_names"},
            },
            "maps": {"seed": ["id"], "files": ["name"]},
        });

        let mut batch = Batch::from_config(&cfg, &json!({})).unwrap();
        batch.run_once().await.unwrap();
        let after_first_run = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(after_first_run, "name\n");

        batch.run_once().await.unwrap();
        let after_second_run = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(after_second_run, "name\na\nb\n");
    }
}
