use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    analytics::{AnalysisOptions, AnalyticsEngine},
    cleaner::{self, CleanTable},
    error::StructuralError,
    mapper::SchemaMapper,
    raw::{self, LoadOptions, RawTable},
    result::AnalysisResult,
};

/// Outcome of an import, shaped for the presentation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CleanTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ImportResult {
    fn from_result(result: Result<CleanTable, StructuralError>) -> Self {
        match result {
            Ok(table) => {
                let message = if table.dropped_rows() > 0 {
                    format!(
                        "Imported {} row(s); dropped {} without a usable date",
                        table.len(),
                        table.dropped_rows()
                    )
                } else {
                    format!("Imported {} row(s)", table.len())
                };
                Self {
                    valid: true,
                    error: None,
                    data: Some(table),
                    message: Some(message),
                }
            }
            Err(err) => Self {
                valid: false,
                error: Some(err.to_string()),
                data: None,
                message: None,
            },
        }
    }
}

/// Validates, standardizes and cleans `raw`.
pub fn try_import(raw: RawTable, mapper: &SchemaMapper) -> Result<CleanTable, StructuralError> {
    let found = mapper.check(&raw)?;
    info!(
        "Recognized {} canonical field(s) across {} source column(s)",
        found.len(),
        raw.column_count()
    );
    let rows = raw.row_count();
    let table = cleaner::clean(mapper.standardize(raw));
    if table.is_empty() {
        return Err(StructuralError::NoUsableRows { rows });
    }
    Ok(table)
}

pub fn import_table(raw: RawTable, mapper: &SchemaMapper) -> ImportResult {
    ImportResult::from_result(try_import(raw, mapper))
}

/// Loads a delimited export from disk and imports it.
pub fn import_file(path: &Path, load: &LoadOptions, mapper: &SchemaMapper) -> Result<CleanTable> {
    let raw = raw::load_raw_table(path, load)?;
    try_import(raw, mapper).with_context(|| format!("Importing {path:?}"))
}

/// Full pipeline: import followed by analysis.
pub fn run_pipeline(
    raw: RawTable,
    mapper: &SchemaMapper,
    options: &AnalysisOptions,
) -> Result<AnalysisResult, StructuralError> {
    let table = try_import(raw, mapper)?;
    Ok(AnalyticsEngine::new(options.clone()).analyze(&table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(
            headers.iter().copied(),
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::from(*v)).collect())
                .collect::<Vec<Vec<Cell>>>(),
        )
    }

    #[test]
    fn import_reports_structural_errors() {
        let result = import_table(
            raw(&["a", "b", "c"], &[&["1", "2", "3"]]),
            &SchemaMapper::default(),
        );
        assert!(!result.valid);
        assert!(result.data.is_none());
        let json = serde_json::to_value(&result).unwrap();
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("Insufficient recognizable structure")
        );
        assert!(json.get("data").is_none());
    }

    #[test]
    fn import_fails_when_every_row_is_dropped() {
        let err = try_import(
            raw(&["date", "platform", "content"], &[&["bad", "微博", "a"], &["", "微博", "b"]]),
            &SchemaMapper::default(),
        )
        .unwrap_err();
        assert_eq!(err, StructuralError::NoUsableRows { rows: 2 });
    }

    #[test]
    fn import_success_carries_data_and_message() {
        let result = import_table(
            raw(
                &["date", "platform", "content"],
                &[&["2024-01-01", "微博", "a"], &["nope", "微博", "b"]],
            ),
            &SchemaMapper::default(),
        );
        assert!(result.valid);
        assert_eq!(result.data.as_ref().map(CleanTable::len), Some(1));
        assert_eq!(
            result.message.as_deref(),
            Some("Imported 1 row(s); dropped 1 without a usable date")
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["data"][0]["platform"], "微博");
        assert_eq!(json["data"][0]["date"], "2024-01-01T00:00:00");
    }

    #[test]
    fn run_pipeline_returns_all_blocks() {
        let result = run_pipeline(
            raw(
                &["date", "platform", "content", "likes"],
                &[&["2024-01-01", "微博", "a", "5"], &["2024-01-02", "微博", "b", "7"]],
            ),
            &SchemaMapper::default(),
            &AnalysisOptions::default(),
        )
        .unwrap();
        assert_eq!(result.overview.number("数据条数"), Some(2.0));
        assert_eq!(result.growth.number("互动量增长数"), Some(2.0));
    }
}
