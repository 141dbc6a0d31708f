use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;

use crate::{data::Cell, io_utils};

/// Source table as loaded from an export: arbitrary column names in file
/// order, stored column-major. Duplicate header names stay distinct columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    columns: Vec<Vec<Cell>>,
    row_count: usize,
}

impl RawTable {
    /// Builds a table from row-major data. Short rows are padded with
    /// [`Cell::Empty`]; extra trailing cells are discarded.
    pub fn from_rows<H, R>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = Vec<Cell>>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        let mut row_count = 0usize;
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or_default());
            }
            row_count += 1;
        }
        Self {
            headers,
            columns,
            row_count,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.headers.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&[Cell]> {
        self.columns.get(index).map(|c| c.as_slice())
    }

    /// Returns the first column with exactly this header.
    pub fn column_by_name(&self, name: &str) -> Option<&[Cell]> {
        let index = self.headers.iter().position(|h| h == name)?;
        self.column(index)
    }

    pub(crate) fn into_columns(self) -> (Vec<String>, Vec<Vec<Cell>>, usize) {
        (self.headers, self.columns, self.row_count)
    }
}

/// How a delimited export is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub has_headers: bool,
    /// Maximum data rows to read; `0` reads everything.
    pub max_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: encoding_rs::UTF_8,
            has_headers: true,
            max_rows: 0,
        }
    }
}

impl LoadOptions {
    /// Options for `path` with the delimiter inferred from its extension
    /// unless `delimiter` is provided.
    pub fn for_path(path: &Path, delimiter: Option<u8>) -> Self {
        Self {
            delimiter: io_utils::resolve_input_delimiter(path, delimiter),
            ..Self::default()
        }
    }
}

fn generate_field_names(count: usize) -> Vec<String> {
    (1..=count).map(|idx| format!("field_{idx}")).collect()
}

pub fn load_raw_table(path: &Path, options: &LoadOptions) -> Result<RawTable> {
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
    let mut records = reader.byte_records();

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let headers = if options.has_headers {
        match records.next() {
            Some(record) => {
                let record = record.with_context(|| format!("Reading header row in {path:?}"))?;
                io_utils::decode_headers(&record, options.encoding)
                    .with_context(|| format!("Decoding header row in {path:?}"))?
            }
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let first_data_line = if options.has_headers { 2 } else { 1 };
    let mut width = headers.len();
    for (row_idx, record) in records.enumerate() {
        if options.max_rows > 0 && rows.len() >= options.max_rows {
            break;
        }
        let line = row_idx + first_data_line;
        let record = record.with_context(|| format!("Reading row {line} in {path:?}"))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {line} in {path:?}"))?;
        if decoded.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        width = width.max(decoded.len());
        rows.push(decoded.iter().map(|field| Cell::from_field(field)).collect());
    }

    let headers = if options.has_headers {
        headers
    } else {
        generate_field_names(width)
    };
    debug!(
        "Loaded {} row(s) across {} column(s) from {:?}",
        rows.len(),
        headers.len(),
        path
    );
    Ok(RawTable::from_rows(headers, rows))
}
