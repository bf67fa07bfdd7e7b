use crate::compile::{Branch, StepKind};
use batchout_extract::Extractor;
use batchout_model::{Bindings, Column, ColumnValue, Index};
use std::collections::HashMap;

/// Walks one payload under a source's compiled branches, producing typed
/// rows over the Batch's full column order. Columns not touched by a given
/// branch's binding are `None`; rows that end up entirely `None` are
/// dropped, matching the "all-null rows are elided" rule.
pub struct Walker<'a> {
    pub columns: &'a indexmap::IndexMap<String, Box<dyn Column>>,
}

impl<'a> Walker<'a> {
    pub fn walk(
        &self,
        branches: &[Branch],
        indexes: &HashMap<String, Box<dyn Index>>,
        extractors: &HashMap<String, Box<dyn Extractor>>,
        payload: &[u8],
    ) -> Vec<Vec<Option<ColumnValue>>> {
        let mut rows = Vec::new();
        for branch in branches {
            let mut candidates = vec![Bindings::new()];
            let mut column_tuple: Vec<String> = Vec::new();

            for step in branch {
                match step.kind {
                    StepKind::Index => {
                        candidates = self.expand_index(&step.path, &candidates, indexes, extractors, payload);
                        if candidates.is_empty() {
                            break;
                        }
                    }
                    StepKind::Column => column_tuple.push(step.path.clone()),
                }
            }

            if candidates.is_empty() {
                continue;
            }

            for binding in &candidates {
                let row = self.build_row(&column_tuple, extractors, payload, binding);
                if row.iter().any(Option::is_some) {
                    rows.push(row);
                }
            }
        }
        rows
    }

    fn expand_index(
        &self,
        name: &str,
        candidates: &[Bindings],
        indexes: &HashMap<String, Box<dyn Index>>,
        extractors: &HashMap<String, Box<dyn Extractor>>,
        payload: &[u8],
    ) -> Vec<Bindings> {
        let Some(index) = indexes.get(name) else {
            tracing::warn!(index = name, "no index bound under this name; eliding branch");
            return Vec::new();
        };
        let Some(extractor) = extractors.get(index.extractor_name()) else {
            tracing::warn!(index = name, extractor = index.extractor_name(), "no extractor bound under this name; eliding branch");
            return Vec::new();
        };
        let mut next = Vec::new();
        for binding in candidates {
            for value in index.values(extractor.as_ref(), payload, binding) {
                next.push(binding.clone().with(name, value));
            }
        }
        next
    }

    fn build_row(
        &self,
        column_tuple: &[String],
        extractors: &HashMap<String, Box<dyn Extractor>>,
        payload: &[u8],
        binding: &Bindings,
    ) -> Vec<Option<ColumnValue>> {
        self.columns
            .iter()
            .map(|(name, column)| {
                if !column_tuple.iter().any(|c| c == name) {
                    return None;
                }
                extractors
                    .get(column.extractor_name())
                    .and_then(|extractor| column.value(extractor.as_ref(), payload, binding))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compile::{compile, parse_literal};
    use batchout_extract::{JsonPointerExtractor, Strategy};
    use batchout_model::{Column as ColumnTrait, Index as IndexTrait};

    fn extractors() -> HashMap<String, Box<dyn Extractor>> {
        let mut m: HashMap<String, Box<dyn Extractor>> = HashMap::new();
        m.insert("json_pointer".into(), Box::new(JsonPointerExtractor::new(Strategy::TakeFirst).unwrap()));
        m
    }

    fn indexes() -> HashMap<String, Box<dyn Index>> {
        batchout_model::register_defaults();
        let mut m: HashMap<String, Box<dyn Index>> = HashMap::new();
        let f = batchout_config::Fragment::from_value(serde_json::json!({
            "type": "for_list", "path": ".orders", "extractor": "json_pointer"
        }))
        .unwrap();
        m.insert("orders".into(), batchout_model::index_registry().create(&f).unwrap());
        m
    }

    fn columns() -> indexmap::IndexMap<String, Box<dyn Column>> {
        batchout_model::register_defaults();
        let mut m: indexmap::IndexMap<String, Box<dyn Column>> = indexmap::IndexMap::new();
        let f = batchout_config::Fragment::from_value(serde_json::json!({
            "type": "integer", "path": ".orders[{orders}].id", "extractor": "json_pointer"
        }))
        .unwrap();
        m.insert("order_id".into(), batchout_model::column_registry().create(&f).unwrap());
        m
    }

    #[test]
    fn walks_a_list_index_into_one_row_per_element() {
        let nodes = parse_literal(&serde_json::json!([{"orders": ["order_id"]}])).unwrap();
        let branches = compile(&nodes);
        let cols = columns();
        let walker = Walker { columns: &cols };
        let payload = serde_json::to_vec(&serde_json::json!({"orders": [{"id": 1}, {"id": 2}]})).unwrap();
        let rows = walker.walk(&branches, &indexes(), &extractors(), &payload);
        assert_eq!(rows, vec![vec![Some(ColumnValue::Integer(1))], vec![Some(ColumnValue::Integer(2))]]);
    }

    #[test]
    fn empty_list_elides_the_branch_entirely() {
        let nodes = parse_literal(&serde_json::json!([{"orders": ["order_id"]}])).unwrap();
        let branches = compile(&nodes);
        let cols = columns();
        let walker = Walker { columns: &cols };
        let payload = serde_json::to_vec(&serde_json::json!({"orders": []})).unwrap();
        let rows = walker.walk(&branches, &indexes(), &extractors(), &payload);
        assert!(rows.is_empty());
    }

    #[test]
    fn all_null_row_is_dropped() {
        let nodes = parse_literal(&serde_json::json!([{"orders": ["order_id"]}])).unwrap();
        let branches = compile(&nodes);
        let cols = columns();
        let walker = Walker { columns: &cols };
        let payload = serde_json::to_vec(&serde_json::json!({"orders": [{"nope": 1}]})).unwrap();
        let rows = walker.walk(&branches, &indexes(), &extractors(), &payload);
        assert!(rows.is_empty());
    }

    #[test]
    fn no_index_branch_emits_exactly_one_row() {
        let nodes = parse_literal(&serde_json::json!(["order_id"])).unwrap();
        let branches = compile(&nodes);
        let mut cols: indexmap::IndexMap<String, Box<dyn Column>> = indexmap::IndexMap::new();
        batchout_model::register_defaults();
        let f = batchout_config::Fragment::from_value(serde_json::json!({
            "type": "integer", "path": ".id", "extractor": "json_pointer"
        }))
        .unwrap();
        cols.insert("order_id".into(), batchout_model::column_registry().create(&f).unwrap());
        let walker = Walker { columns: &cols };
        let payload = serde_json::to_vec(&serde_json::json!({"id": 9})).unwrap();
        let rows = walker.walk(&branches, &HashMap::new(), &extractors(), &payload);
        assert_eq!(rows, vec![vec![Some(ColumnValue::Integer(9))]]);
    }
}
