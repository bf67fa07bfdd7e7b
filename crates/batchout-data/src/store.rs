use crate::error::DataError;
use batchout_model::ColumnValue;
use chrono::{NaiveDate, TimeZone};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::collections::HashMap;

/// The declared scalar kind of one column in the schema, used to restore a
/// typed `ColumnValue` from the raw storage class sqlite hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
}

fn to_sql(value: &Option<ColumnValue>) -> SqlValue {
    match value {
        None => SqlValue::Null,
        Some(ColumnValue::String(s)) => SqlValue::Text(s.clone()),
        Some(ColumnValue::Integer(i)) => SqlValue::Integer(*i),
        Some(ColumnValue::Float(f)) => SqlValue::Real(*f),
        Some(ColumnValue::Boolean(b)) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Some(ColumnValue::Date(d)) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Some(ColumnValue::Datetime(dt)) => SqlValue::Text(dt.to_rfc3339()),
    }
}

/// Restores a `ColumnValue` from a raw sqlite storage class, per the
/// column's declared kind. An unknown column (not present in the schema,
/// e.g. a Selector's own alias) falls back to sqlite's native storage
/// class: integers/reals/text pass through, blobs are unsupported.
fn from_sql(raw: SqlValue, kind: Option<ColumnKind>) -> Option<ColumnValue> {
    if matches!(raw, SqlValue::Null) {
        return None;
    }
    match (kind, &raw) {
        (Some(ColumnKind::Boolean), SqlValue::Integer(i)) => Some(ColumnValue::Boolean(*i != 0)),
        (Some(ColumnKind::Date), SqlValue::Text(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(ColumnValue::Date),
        (Some(ColumnKind::Datetime), SqlValue::Text(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| ColumnValue::Datetime(chrono_tz::UTC.from_utc_datetime(&dt.naive_utc()))),
        (Some(ColumnKind::Integer), SqlValue::Integer(i)) => Some(ColumnValue::Integer(*i)),
        (Some(ColumnKind::Float), SqlValue::Real(f)) => Some(ColumnValue::Float(*f)),
        (Some(ColumnKind::String), SqlValue::Text(s)) => Some(ColumnValue::String(s.clone())),
        (_, SqlValue::Integer(i)) => Some(ColumnValue::Integer(*i)),
        (_, SqlValue::Real(f)) => Some(ColumnValue::Float(*f)),
        (_, SqlValue::Text(s)) => Some(ColumnValue::String(s.clone())),
        (_, SqlValue::Blob(_)) => None,
        (_, SqlValue::Null) => None,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The per-run relational scratch space: one table per source, sharing a
/// single schema (the full ordered column list of the batch). Rows are
/// appended as payloads are walked; `rows`/`query` apply type restoration
/// on read. Backed by an in-memory rusqlite connection created lazily and
/// torn down on `reset`.
pub struct Data {
    columns: Vec<String>,
    kinds: HashMap<String, ColumnKind>,
    conn: Option<Connection>,
    sources: Vec<String>,
    len: usize,
}

impl Data {
    pub fn new(columns: Vec<String>, kinds: HashMap<String, ColumnKind>) -> Data {
        Data { columns, kinds, conn: None, sources: Vec::new(), len: 0 }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn connection(&mut self) -> Result<&Connection, DataError> {
        if self.conn.is_none() {
            self.conn = Some(Connection::open_in_memory()?);
        }
        Ok(self.conn.as_ref().unwrap())
    }

    pub fn with_sources(&mut self, sources: &[String]) -> Result<&mut Self, DataError> {
        for source in sources {
            if self.sources.contains(source) {
                continue;
            }
            let ddl = format!(
                "CREATE TABLE {}({})",
                quote_ident(source),
                self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(",")
            );
            self.connection()?.execute(&ddl, [])?;
            self.sources.push(source.clone());
        }
        Ok(self)
    }

    pub fn with_row(&mut self, source: &str, row: Vec<Option<ColumnValue>>) -> Result<&mut Self, DataError> {
        self.with_sources(std::slice::from_ref(&source.to_string()))?;
        let placeholders = vec!["?"; self.columns.len()].join(",");
        let sql = format!(
            "INSERT INTO {}({}) VALUES ({})",
            quote_ident(source),
            self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(","),
            placeholders
        );
        let mut values: Vec<SqlValue> = row.iter().take(self.columns.len()).map(to_sql).collect();
        values.resize(self.columns.len(), SqlValue::Null);
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        self.connection()?.execute(&sql, params.as_slice())?;
        self.len += 1;
        Ok(self)
    }

    pub fn rows(&mut self, source: &str) -> Result<Option<Vec<Vec<Option<ColumnValue>>>>, DataError> {
        if !self.sources.contains(&source.to_string()) {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {} FROM {}",
            self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(","),
            quote_ident(source)
        );
        let (_names, rows) = self.query(&sql)?;
        Ok(Some(rows))
    }

    /// Executes an arbitrary SQL statement (the SQL Selector's job) and
    /// restores typed values by matching returned column names against the
    /// schema's declared kinds.
    pub fn query(&mut self, sql: &str) -> Result<(Vec<String>, Vec<Vec<Option<ColumnValue>>>), DataError> {
        self.connection()?;
        let conn = self.conn.as_ref().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(|s| s.to_string()).collect();
        let kinds = &self.kinds;
        let width = names.len();
        let rows = stmt.query_map([], |row| {
            let mut out = Vec::with_capacity(width);
            for i in 0..width {
                let raw: SqlValue = row.get(i)?;
                out.push(from_sql(raw, kinds.get(&names[i]).copied()));
            }
            Ok(out)
        })?;
        let mut collected = Vec::new();
        for row in rows {
            collected.push(row?);
        }
        Ok((names, collected))
    }

    pub fn reset(&mut self) -> &mut Self {
        self.conn = None;
        self.sources.clear();
        self.len = 0;
        self
    }

    /// Deep-copies every source's rows into a fresh, independent store,
    /// matching the original's `clone()` (used so per-worker Data instances
    /// never share sqlite state with the controller's).
    pub fn clone_store(&mut self) -> Result<Data, DataError> {
        let mut cloned = Data::new(self.columns.clone(), self.kinds.clone());
        let sources = self.sources.clone();
        for source in sources {
            if let Some(rows) = self.rows(&source)? {
                for row in rows {
                    cloned.with_row(&source, row)?;
                }
            }
        }
        Ok(cloned)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn schema() -> (Vec<String>, HashMap<String, ColumnKind>) {
        let columns = vec!["id".to_string(), "flag".to_string(), "at".to_string()];
        let mut kinds = HashMap::new();
        kinds.insert("id".to_string(), ColumnKind::Integer);
        kinds.insert("flag".to_string(), ColumnKind::Boolean);
        kinds.insert("at".to_string(), ColumnKind::Datetime);
        (columns, kinds)
    }

    #[test]
    fn round_trips_boolean_and_datetime_through_readback() {
        let (columns, kinds) = schema();
        let mut data = Data::new(columns, kinds);
        let dt = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        data.with_row("orders", vec![Some(ColumnValue::Integer(1)), Some(ColumnValue::Boolean(true)), Some(ColumnValue::Datetime(dt))]).unwrap();
        let rows = data.rows("orders").unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Some(ColumnValue::Boolean(true)));
        assert!(matches!(rows[0][2], Some(ColumnValue::Datetime(_))));
    }

    #[test]
    fn unknown_source_yields_none() {
        let (columns, kinds) = schema();
        let mut data = Data::new(columns, kinds);
        assert_eq!(data.rows("nope").unwrap(), None);
    }

    #[test]
    fn reset_drops_sources_and_length() {
        let (columns, kinds) = schema();
        let mut data = Data::new(columns, kinds);
        data.with_row("a", vec![Some(ColumnValue::Integer(1)), None, None]).unwrap();
        assert_eq!(data.len(), 1);
        data.reset();
        assert_eq!(data.len(), 0);
        assert!(data.sources().is_empty());
    }

    #[test]
    fn clone_store_is_independent() {
        let (columns, kinds) = schema();
        let mut data = Data::new(columns, kinds);
        data.with_row("a", vec![Some(ColumnValue::Integer(1)), None, None]).unwrap();
        let mut cloned = data.clone_store().unwrap();
        cloned.with_row("a", vec![Some(ColumnValue::Integer(2)), None, None]).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(cloned.len(), 2);
    }
}
