use super::{render_cell, Output};
use crate::error::OutputError;
use batchout_config::{ConfigError, Fragment};
use batchout_model::ColumnValue;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Appends (or overwrites) rows to a CSV file, writing the header on every
/// call to `ingest` — matching the original, which reopens and rewrites a
/// header on each batch rather than tracking whether one was already
/// written.
pub struct CsvOutput {
    path: PathBuf,
    mode: Mode,
    delimiter: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Append,
    Overwrite,
}

impl CsvOutput {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Output>, ConfigError> {
        let path: String = fragment.required("path")?;
        let mode_name = fragment.choice("mode", &["append", "overwrite"], Some("append"))?;
        let mode = if mode_name == "append" { Mode::Append } else { Mode::Overwrite };
        let delimiter: String = fragment.with_default("delimiter", ",".to_string())?;
        let delimiter = delimiter.as_bytes().first().copied().unwrap_or(b',');
        Ok(Box::new(CsvOutput { path: PathBuf::from(path), mode, delimiter }))
    }
}

impl Output for CsvOutput {
    fn ingest(&mut self, columns: &[String], rows: &[Vec<Option<ColumnValue>>]) -> Result<usize, OutputError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(self.mode == Mode::Append)
            .truncate(self.mode == Mode::Overwrite)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().delimiter(self.delimiter).from_writer(file);
        writer.write_record(columns)?;
        let mut count = 0;
        for row in rows {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            writer.write_record(&cells)?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }

    fn commit(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let f = Fragment::from_value(serde_json::json!({
            "type": "csv", "path": path.to_string_lossy(), "mode": "overwrite",
        }))
        .unwrap();
        let mut output = CsvOutput::construct(&f).unwrap();
        let rows = vec![vec![Some(ColumnValue::Integer(1)), None]];
        let n = output.ingest(&["id".into(), "name".into()], &rows).unwrap();
        assert_eq!(n, 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "id,name\n1,\n");
    }
}
