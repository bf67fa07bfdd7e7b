use super::{render_cell, Output};
use crate::error::OutputError;
use batchout_config::{ConfigError, Fragment};
use batchout_model::ColumnValue;

const TRUNCATE_MARKER: &str = "...";

/// Writes each row as a fixed-width, `tracing::debug!` table row. Useful
/// for dry runs and local debugging; never fails.
pub struct LoggerOutput {
    width: usize,
}

impl LoggerOutput {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Output>, ConfigError> {
        let width: usize = fragment.with_default("width", 80usize)?;
        Ok(Box::new(LoggerOutput { width }))
    }

    fn format_cell(size: usize, value: &str) -> String {
        let text_size = size.saturating_sub(TRUNCATE_MARKER.len());
        let mut cell = if value.len() > text_size {
            format!("{}{}", &value[..text_size.min(value.len())], TRUNCATE_MARKER)
        } else {
            value.to_string()
        };
        while cell.len() < size {
            cell.push(' ');
        }
        cell
    }
}

impl Output for LoggerOutput {
    fn ingest(&mut self, columns: &[String], rows: &[Vec<Option<ColumnValue>>]) -> Result<usize, OutputError> {
        if columns.is_empty() {
            return Ok(0);
        }
        let column_max_width = self.width / columns.len();
        let column_min_width = columns.iter().map(|c| c.len()).max().unwrap_or(0).min(column_max_width);
        let cell_size = column_min_width.max(column_max_width).saturating_sub(TRUNCATE_MARKER.len()) + 1;

        let header: Vec<String> = columns.iter().map(|c| Self::format_cell(cell_size, c)).collect();
        tracing::debug!(table = "header", "{}", header.join("_|_"));

        let mut count = 0;
        for row in rows {
            let cells: Vec<String> = row.iter().map(|v| Self::format_cell(cell_size, &render_cell(v))).collect();
            tracing::debug!(table = "row", "{}", cells.join(" | "));
            count += 1;
        }
        Ok(count)
    }

    fn commit(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}
