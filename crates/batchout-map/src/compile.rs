use crate::error::MapError;
use serde_json::Value;

/// One parsed element of a map literal: either a leaf column reference, or
/// an index with a nested list of child elements.
#[derive(Debug, Clone, PartialEq)]
pub enum MapNode {
    Column(String),
    Index { name: String, children: Vec<MapNode> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Index,
    Column,
}

/// One step of a compiled branch: a column or index name, plus the ordered
/// list of ancestor index names it depends on (must already be bound by
/// the time this step is walked).
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub path: String,
    pub deps: Vec<String>,
    pub kind: StepKind,
}

pub type Branch = Vec<Step>;

/// Parses one source's map literal (`[leaf | {index: [children...]}]`)
/// from its JSON config representation.
pub fn parse_literal(value: &Value) -> Result<Vec<MapNode>, MapError> {
    let Value::Array(elements) = value else {
        return Err(MapError::InvalidElement(value.clone()));
    };
    elements.iter().map(parse_element).collect()
}

fn parse_element(value: &Value) -> Result<MapNode, MapError> {
    match value {
        Value::String(s) => Ok(MapNode::Column(s.clone())),
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(MapError::NotASingleKeyMapping(map.len()));
            }
            let (name, children_value) = map.iter().next().unwrap();
            let Value::Array(children_raw) = children_value else {
                return Err(MapError::ChildrenNotAList(children_value.clone()));
            };
            let children = children_raw.iter().map(parse_element).collect::<Result<_, _>>()?;
            Ok(MapNode::Index { name: name.clone(), children })
        }
        other => Err(MapError::InvalidElement(other.clone())),
    }
}

/// Compiles parsed map nodes into an ordered list of branches. A branch is
/// a path from the map's root to one leaf, recording every index
/// encountered along the way (with its ancestor dependencies) followed by
/// the columns hanging directly off it. Sibling elements combine via a
/// Cartesian product: each branch from one sibling pairs with each branch
/// from the next.
pub fn compile(nodes: &[MapNode]) -> Vec<Branch> {
    compile_with_ancestors(nodes, &[])
}

fn compile_with_ancestors(nodes: &[MapNode], ancestors: &[String]) -> Vec<Branch> {
    let per_element: Vec<Vec<Branch>> = nodes
        .iter()
        .map(|node| match node {
            MapNode::Column(name) => {
                vec![vec![Step { path: name.clone(), deps: ancestors.to_vec(), kind: StepKind::Column }]]
            }
            MapNode::Index { name, children } => {
                let mut child_ancestors = ancestors.to_vec();
                child_ancestors.push(name.clone());
                let child_branches = compile_with_ancestors(children, &child_ancestors);
                let own = Step { path: name.clone(), deps: ancestors.to_vec(), kind: StepKind::Index };
                child_branches
                    .into_iter()
                    .map(|child_branch| {
                        let mut branch = vec![own.clone()];
                        branch.extend(child_branch);
                        branch
                    })
                    .collect()
            }
        })
        .collect();
    cartesian_concat(&per_element)
}

fn cartesian_concat(lists: &[Vec<Branch>]) -> Vec<Branch> {
    let mut result: Vec<Branch> = vec![Vec::new()];
    for alternatives in lists {
        let mut next = Vec::with_capacity(result.len() * alternatives.len().max(1));
        for existing in &result {
            for alt in alternatives {
                let mut combined = existing.clone();
                combined.extend(alt.clone());
                next.push(combined);
            }
        }
        result = next;
    }
    result
}

/// Every step's deps must already have been bound by an earlier Index step
/// in the same branch. Compilation guarantees this by construction (a
/// node's ancestors are always its enclosing Index names, each emitted
/// before recursing into children), so this is a sanity check rather than
/// a separate sort pass.
pub fn well_ordered(branch: &Branch) -> bool {
    let mut bound: Vec<&str> = Vec::new();
    for step in branch {
        if !step.deps.iter().all(|d| bound.contains(&d.as_str())) {
            return false;
        }
        if step.kind == StepKind::Index {
            bound.push(&step.path);
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_leaf_is_one_branch() {
        let nodes = parse_literal(&serde_json::json!(["id"])).unwrap();
        let branches = compile(&nodes);
        assert_eq!(branches, vec![vec![Step { path: "id".into(), deps: vec![], kind: StepKind::Column }]]);
    }

    #[test]
    fn sibling_leaves_produce_cartesian_singleton_branches() {
        let nodes = parse_literal(&serde_json::json!(["id", "name"])).unwrap();
        let branches = compile(&nodes);
        assert_eq!(
            branches,
            vec![vec![
                Step { path: "id".into(), deps: vec![], kind: StepKind::Column },
                Step { path: "name".into(), deps: vec![], kind: StepKind::Column },
            ]]
        );
    }

    #[test]
    fn nested_index_carries_ancestor_deps() {
        let nodes = parse_literal(&serde_json::json!([{"orders": ["id"]}])).unwrap();
        let branches = compile(&nodes);
        assert_eq!(branches.len(), 1);
        assert!(well_ordered(&branches[0]));
        assert_eq!(branches[0][0], Step { path: "orders".into(), deps: vec![], kind: StepKind::Index });
        assert_eq!(branches[0][1], Step { path: "id".into(), deps: vec!["orders".into()], kind: StepKind::Column });
    }

    #[test]
    fn two_axis_cartesian_product_across_nested_indexes() {
        let nodes = parse_literal(&serde_json::json!([
            {"orders": [{"items": ["sku"]}, "order_id"]}
        ]))
        .unwrap();
        let branches = compile(&nodes);
        // "items" subtree and the sibling "order_id" leaf combine via cartesian product.
        assert_eq!(branches.len(), 1);
        let paths: Vec<&str> = branches[0].iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["orders", "items", "sku", "order_id"]);
    }

    #[test]
    fn invalid_element_is_rejected() {
        assert!(parse_literal(&serde_json::json!([42])).is_err());
    }

    #[test]
    fn multi_key_mapping_is_rejected() {
        assert!(parse_literal(&serde_json::json!([{"a": [], "b": []}])).is_err());
    }
}
