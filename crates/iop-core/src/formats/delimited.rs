//! Delimited text (CSV/TSV) <-> `RawTable` / `Table`.

use crate::config::InputOptions;
use crate::tables::Table;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::io::Read;

// =============================================================================
// RAW TABLE
// =============================================================================

/// One data row as read from the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Cells, padded to the header width.
    pub values: Vec<String>,
}

/// Untyped survey export: header plus string cells.
///
/// Corrections are applied at this level, before any parsing, so that a
/// fix can target any column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Index of a column by exact (trimmed) header name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::Schema(format!("missing required column '{}'", name)))
    }

    /// Index of a configured column. Not configured is fine; configured
    /// but absent is a schema error.
    pub fn optional_column(&self, name: Option<&str>) -> Result<Option<usize>> {
        name.map(|n| self.require_column(n)).transpose()
    }

    /// Cell at `row` in the named column.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows
            .get(row)
            .and_then(|r| r.values.get(col))
            .map(String::as_str)
    }

    /// Overwrite a cell. Returns `false` if the row or column does not exist.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row).and_then(|r| r.values.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// READING
// =============================================================================

/// Read a delimited table with a header row.
pub fn read_table<R: Read>(reader: R, options: &InputOptions) -> Result<RawTable> {
    let delimiter = delimiter_byte(options.delimiter)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::Schema("input has no header row".to_string()));
    }
    let mut seen = BTreeSet::new();
    for header in &headers {
        if !header.is_empty() && !seen.insert(header.as_str()) {
            return Err(Error::Schema(format!("duplicate column '{}'", header)));
        }
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        if index < options.skip_rows {
            continue;
        }
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        if record.len() > width && record.iter().skip(width).any(|c| !c.is_empty()) {
            return Err(Error::Shape {
                row: line,
                message: format!("row has {} cells but the header has {}", record.len(), width),
            });
        }
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut values: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        values.resize(width, String::new());
        rows.push(RawRecord { line, values });
    }

    Ok(RawTable { headers, rows })
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::Config(format!("delimiter must be ASCII, got '{}'", delimiter)))
}

// =============================================================================
// WRITING
// =============================================================================

/// Serialize a table as delimited text with a header row.
pub fn write_table(table: &Table, delimiter: char) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

// =============================================================================
// TESTS
// =============================================================================
