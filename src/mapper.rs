//! Schema mapping: reconciles arbitrary source columns to the canonical
//! field set.
//!
//! 1. Every source column is classified against the [`FieldDictionary`];
//!    first matching field in declaration order wins.
//! 2. Fields with several matches are combined by a named merge policy
//!    ([`NumericMergePolicy`] for metrics, [`TextMergePolicy`] otherwise).
//! 3. Fields with one match are renamed in place; fields with none are
//!    synthesized from defaults.
//!
//! Source columns that do not survive as a canonical column are kept on the
//! [`CanonicalTable`] as auxiliary columns so platform-specific metrics stay
//! reachable for correlation.

use chrono::{Local, NaiveDateTime};
use log::debug;
use serde::Serialize;

use crate::{
    data::Cell,
    dictionary::{CanonicalField, FieldDictionary, SemanticType},
    error::StructuralError,
    raw::RawTable,
};

pub const MIN_COLUMNS: usize = 3;
pub const MIN_CORE_MATCHES: usize = 2;
pub const CORE_FIELDS: [CanonicalField; 3] = [
    CanonicalField::Date,
    CanonicalField::Platform,
    CanonicalField::Content,
];
pub const DEFAULT_CATEGORY_LABEL: &str = "未知";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How several source columns matched to one metric field are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericMergePolicy {
    #[default]
    Sum,
    Average,
}

impl NumericMergePolicy {
    /// Combines contributor columns row-wise. Unparseable cells count as 0.
    pub fn merge(&self, contributors: &[Vec<Cell>], rows: usize) -> Vec<Cell> {
        (0..rows)
            .map(|row| {
                let total: f64 = contributors
                    .iter()
                    .map(|column| column.get(row).map_or(0.0, Cell::metric_or_zero))
                    .sum();
                match self {
                    NumericMergePolicy::Sum => Cell::Number(total),
                    NumericMergePolicy::Average => {
                        Cell::Number(total / contributors.len() as f64)
                    }
                }
            })
            .collect()
    }
}

/// How several source columns matched to one non-metric field are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMergePolicy {
    #[default]
    KeepFirst,
}

impl TextMergePolicy {
    /// Returns the index of the contributor that becomes the canonical column.
    pub fn select(&self, contributors: &[Vec<Cell>]) -> usize {
        match self {
            TextMergePolicy::KeepFirst => {
                debug_assert!(!contributors.is_empty());
                0
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapperOptions {
    pub numeric_merge: NumericMergePolicy,
    pub text_merge: TextMergePolicy,
    /// Value used for a synthesized `date` column.
    pub ingested_at: NaiveDateTime,
    /// Value used for synthesized categorical columns.
    pub category_label: String,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            numeric_merge: NumericMergePolicy::default(),
            text_merge: TextMergePolicy::default(),
            ingested_at: Local::now().naive_local(),
            category_label: DEFAULT_CATEGORY_LABEL.to_string(),
        }
    }
}

/// A source column kept alongside the canonical fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryColumn {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Exactly the ten canonical columns, plus lineage and auxiliary columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    columns: [Vec<Cell>; 10],
    lineage: [Vec<String>; 10],
    auxiliary: Vec<AuxiliaryColumn>,
    row_count: usize,
}

impl CanonicalTable {
    pub fn headers(&self) -> Vec<&'static str> {
        CanonicalField::ALL.iter().map(|f| f.as_str()).collect()
    }

    pub fn column(&self, field: CanonicalField) -> &[Cell] {
        &self.columns[field.index()]
    }

    /// Source columns the field was built from, in file order.
    pub fn lineage(&self, field: CanonicalField) -> &[String] {
        &self.lineage[field.index()]
    }

    pub fn is_synthesized(&self, field: CanonicalField) -> bool {
        self.lineage[field.index()].is_empty()
    }

    pub fn auxiliary(&self) -> &[AuxiliaryColumn] {
        &self.auxiliary
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        [Vec<Cell>; 10],
        [Vec<String>; 10],
        Vec<AuxiliaryColumn>,
        usize,
    ) {
        (self.columns, self.lineage, self.auxiliary, self.row_count)
    }
}

/// Outcome of structural validation, shaped for the import collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub found_fields: Vec<CanonicalField>,
}

impl ValidationReport {
    pub fn from_result(result: Result<Vec<CanonicalField>, StructuralError>) -> Self {
        match result {
            Ok(found_fields) => Self {
                valid: true,
                error: None,
                found_fields,
            },
            Err(err) => Self {
                valid: false,
                error: Some(err.to_string()),
                found_fields: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    dictionary: FieldDictionary,
    options: MapperOptions,
}

impl SchemaMapper {
    pub fn new(dictionary: FieldDictionary, options: MapperOptions) -> Self {
        Self {
            dictionary,
            options,
        }
    }

    /// Classifies each header, in order.
    pub fn classify_columns(&self, headers: &[String]) -> Vec<Option<CanonicalField>> {
        headers
            .iter()
            .map(|header| self.dictionary.classify(header))
            .collect()
    }

    /// Checks that the table carries enough recognizable structure to be
    /// standardized. Returns the matched fields in declaration order.
    pub fn check(&self, raw: &RawTable) -> Result<Vec<CanonicalField>, StructuralError> {
        if raw.is_empty() {
            return Err(StructuralError::EmptyTable);
        }
        if raw.column_count() < MIN_COLUMNS {
            return Err(StructuralError::TooFewColumns {
                found: raw.column_count(),
                required: MIN_COLUMNS,
            });
        }
        let assignments = self.classify_columns(raw.headers());
        let found = CanonicalField::ALL
            .iter()
            .copied()
            .filter(|field| assignments.contains(&Some(*field)))
            .collect::<Vec<_>>();
        let matched = CORE_FIELDS.iter().filter(|f| found.contains(f)).count();
        if matched < MIN_CORE_MATCHES {
            return Err(StructuralError::UnrecognizedSchema {
                matched,
                required: MIN_CORE_MATCHES,
            });
        }
        Ok(found)
    }

    pub fn validate(&self, raw: &RawTable) -> ValidationReport {
        ValidationReport::from_result(self.check(raw))
    }

    pub fn standardize(&self, raw: RawTable) -> CanonicalTable {
        let assignments = self.classify_columns(raw.headers());
        let (headers, source_columns, row_count) = raw.into_columns();

        let mut matched: [Vec<(String, Vec<Cell>)>; 10] = std::array::from_fn(|_| Vec::new());
        let mut auxiliary = Vec::new();
        for ((name, values), assignment) in headers.into_iter().zip(source_columns).zip(assignments)
        {
            match assignment {
                Some(field) => {
                    debug!("Column '{name}' -> {field}");
                    matched[field.index()].push((name, values));
                }
                None => {
                    debug!("Column '{name}' unmatched; kept as auxiliary");
                    auxiliary.push(AuxiliaryColumn { name, values });
                }
            }
        }

        let mut columns: [Vec<Cell>; 10] = std::array::from_fn(|_| Vec::new());
        let mut lineage: [Vec<String>; 10] = std::array::from_fn(|_| Vec::new());
        for field in CanonicalField::ALL {
            let sources = std::mem::take(&mut matched[field.index()]);
            lineage[field.index()] = sources.iter().map(|(name, _)| name.clone()).collect();
            columns[field.index()] = match sources.len() {
                0 => self.default_column(field, row_count),
                1 => sources
                    .into_iter()
                    .next()
                    .map(|(_, values)| values)
                    .unwrap_or_default(),
                count if field.is_metric() => {
                    debug!(
                        "Merging {count} column(s) into {field} with {:?}",
                        self.options.numeric_merge
                    );
                    let (names, values): (Vec<String>, Vec<Vec<Cell>>) =
                        sources.into_iter().unzip();
                    let merged = self.options.numeric_merge.merge(&values, row_count);
                    auxiliary.extend(
                        names
                            .into_iter()
                            .zip(values)
                            .map(|(name, values)| AuxiliaryColumn { name, values }),
                    );
                    merged
                }
                count => {
                    let (names, mut values): (Vec<String>, Vec<Vec<Cell>>) =
                        sources.into_iter().unzip();
                    let keep = self.options.text_merge.select(&values);
                    debug!(
                        "Field {field} matched {count} column(s); keeping '{}'",
                        names[keep]
                    );
                    let kept = values.remove(keep);
                    auxiliary.extend(
                        names
                            .into_iter()
                            .enumerate()
                            .filter(|(idx, _)| *idx != keep)
                            .map(|(_, name)| name)
                            .zip(values)
                            .map(|(name, values)| AuxiliaryColumn { name, values }),
                    );
                    kept
                }
            };
        }

        CanonicalTable {
            columns,
            lineage,
            auxiliary,
            row_count,
        }
    }

    fn default_column(&self, field: CanonicalField, rows: usize) -> Vec<Cell> {
        let value = match field.semantic_type() {
            SemanticType::Timestamp => Cell::Text(
                self.options
                    .ingested_at
                    .format(TIMESTAMP_FORMAT)
                    .to_string(),
            ),
            SemanticType::Category => Cell::Text(self.options.category_label.clone()),
            SemanticType::FreeText => Cell::Empty,
            SemanticType::Metric => Cell::Number(0.0),
        };
        debug!("Field {field} has no source column; synthesized default");
        vec![value; rows]
    }
}
