use crate::error::DataError;
use crate::store::Data;
use batchout_config::{ConfigError, Fragment, Registry};
use batchout_model::ColumnValue;
use std::sync::OnceLock;

/// Projects rows out of the scratch store: `columns()` names the projected
/// shape, `apply` runs the projection against the current run's Data.
pub trait Selector: Send + Sync {
    fn columns(&self) -> &[String];
    fn apply(&self, data: &mut Data) -> Result<Vec<Vec<Option<ColumnValue>>>, DataError>;
}

/// Runs an arbitrary SQL query against the scratch store's connection.
/// `query` is validated as a lexically complete statement at construction —
/// sqlite has no public "is this complete" API exposed through rusqlite,
/// so completeness is approximated the way `sqlite3_complete()` itself
/// works: track quote/comment state and require a trailing `;` outside of
/// either.
pub struct SqlSelector {
    columns: Vec<String>,
    query: String,
}

impl SqlSelector {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Selector>, ConfigError> {
        let columns: Vec<String> = fragment.required("columns")?;
        if columns.is_empty() {
            return Err(ConfigError::invalid("columns", "a non-empty collection of column names is required"));
        }
        let query: String = fragment.required("query")?;
        if !looks_like_complete_statement(&query) {
            return Err(ConfigError::invalid("query", "a valid, complete SQL statement is required"));
        }
        Ok(Box::new(SqlSelector { columns, query }))
    }
}

impl Selector for SqlSelector {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn apply(&self, data: &mut Data) -> Result<Vec<Vec<Option<ColumnValue>>>, DataError> {
        let (_names, rows) = data.query(&self.query)?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.truncate(self.columns.len());
                row
            })
            .collect())
    }
}

fn looks_like_complete_statement(query: &str) -> bool {
    let stmt = format!("{};", query.trim());
    let mut in_single = false;
    let mut in_double = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut saw_non_ws = false;
    let mut chars = stmt.chars().peekable();
    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        if in_single {
            if c == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_double {
            if c == '"' {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_single = true;
                saw_non_ws = true;
            }
            '"' => {
                in_double = true;
                saw_non_ws = true;
            }
            '-' if chars.peek() == Some(&'-') => {
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            c if !c.is_whitespace() => saw_non_ws = true,
            _ => {}
        }
    }
    saw_non_ws && !in_single && !in_double && !in_line_comment && !in_block_comment && stmt.trim_end().ends_with(';')
}

pub fn registry() -> &'static Registry<Box<dyn Selector>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Selector>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("selector"))
}

pub fn register_defaults() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        registry().bind("sql", SqlSelector::construct).expect("default selectors register exactly once");
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::ColumnKind;
    use std::collections::HashMap;

    fn store() -> Data {
        let columns = vec!["id".to_string(), "name".to_string()];
        let mut kinds = HashMap::new();
        kinds.insert("id".to_string(), ColumnKind::Integer);
        kinds.insert("name".to_string(), ColumnKind::String);
        let mut data = Data::new(columns, kinds);
        data.with_row("a", vec![Some(ColumnValue::Integer(1)), Some(ColumnValue::String("x".into()))]).unwrap();
        data.with_row("a", vec![Some(ColumnValue::Integer(2)), Some(ColumnValue::String("y".into()))]).unwrap();
        data
    }

    #[test]
    fn incomplete_query_is_rejected_at_construction() {
        let f = Fragment::from_value(serde_json::json!({
            "type": "sql", "columns": ["id"], "query": "SELECT * FROM \"a"
        }))
        .unwrap();
        assert!(SqlSelector::construct(&f).is_err());
    }

    #[test]
    fn empty_columns_is_rejected() {
        let f = Fragment::from_value(serde_json::json!({
            "type": "sql", "columns": [], "query": "SELECT 1"
        }))
        .unwrap();
        assert!(SqlSelector::construct(&f).is_err());
    }

    #[test]
    fn apply_projects_and_truncates_to_column_count() {
        let f = Fragment::from_value(serde_json::json!({
            "type": "sql", "columns": ["id"], "query": "SELECT id, name FROM \"a\" ORDER BY id"
        }))
        .unwrap();
        let selector = SqlSelector::construct(&f).unwrap();
        let mut data = store();
        let rows = selector.apply(&mut data).unwrap();
        assert_eq!(rows, vec![vec![Some(ColumnValue::Integer(1))], vec![Some(ColumnValue::Integer(2))]]);
    }
}
