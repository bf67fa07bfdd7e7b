use batchout_data::{ColumnKind, Data};
use batchout_extract::Extractor;
use batchout_io::{FetchParams, Input};
use batchout_map::{Branch, Walker};
use batchout_model::{Column, ColumnValue, Index};
use std::collections::HashMap;

/// The work a single reader-task worker performs for one parameter tuple:
/// fetch every payload from its cloned inputs, walk each through that
/// input's compiled branches, and hand the resulting rows back to the
/// controller. Runs entirely off the controller thread, touching no
/// shared mutable state — `inputs` are fresh clones, and the local `Data`
/// this builds is discarded after its rows are read back out.
pub fn read_one(
    inputs: Vec<(String, Box<dyn Input>)>,
    params: FetchParams,
    columns: std::sync::Arc<indexmap::IndexMap<String, Box<dyn Column>>>,
    column_kinds: std::sync::Arc<HashMap<String, ColumnKind>>,
    indexes: std::sync::Arc<HashMap<String, Box<dyn Index>>>,
    extractors: std::sync::Arc<HashMap<String, Box<dyn Extractor>>>,
    maps: std::sync::Arc<HashMap<String, Vec<Branch>>>,
) -> anyhow::Result<(FetchParams, Vec<(String, Vec<Vec<Option<ColumnValue>>>)>)> {
    let column_names: Vec<String> = columns.keys().cloned().collect();
    let mut local = Data::new(column_names, (*column_kinds).clone());
    let walker = Walker { columns: &columns };

    let mut per_source = Vec::with_capacity(inputs.len());
    for (name, mut input) in inputs {
        let empty = Vec::new();
        let branches = maps.get(&name).unwrap_or(&empty);
        while let Some(payload) = input.fetch(&params)? {
            for row in walker.walk(branches, &indexes, &extractors, &payload) {
                local.with_row(&name, row)?;
            }
        }
        input.commit()?;
        let rows = local.rows(&name)?.unwrap_or_default();
        per_source.push((name, rows));
    }
    Ok((params, per_source))
}
