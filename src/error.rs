use thiserror::Error;

/// Failures that reject an import outright. Every other data problem is
/// absorbed by the cleaner (dropped rows, zeroed metrics) or by omission in
/// the analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("The imported table is empty")]
    EmptyTable,
    #[error("The imported table has {found} column(s); at least {required} are required")]
    TooFewColumns { found: usize, required: usize },
    #[error(
        "Insufficient recognizable structure: matched {matched} of date/platform/content, at least {required} required"
    )]
    UnrecognizedSchema { matched: usize, required: usize },
    #[error("None of the {rows} row(s) carries a usable date")]
    NoUsableRows { rows: usize },
}
