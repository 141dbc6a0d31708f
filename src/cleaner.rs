use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Serialize, Serializer};

use crate::{
    data::{Cell, parse_timestamp},
    dictionary::{CanonicalField, SemanticType},
    mapper::{AuxiliaryColumn, CanonicalTable, TIMESTAMP_FORMAT},
};

/// One cleaned row of the canonical table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub date: NaiveDateTime,
    /// `false` when the source only carried a calendar date.
    #[serde(skip)]
    pub has_time: bool,
    pub platform: String,
    pub content_type: String,
    pub engagement: f64,
    pub reach: f64,
    pub conversion: f64,
    pub content: String,
    pub user_type: String,
    pub sentiment: String,
    pub followers: f64,
}

impl PostRecord {
    pub fn metric(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::Engagement => Some(self.engagement),
            CanonicalField::Reach => Some(self.reach),
            CanonicalField::Conversion => Some(self.conversion),
            CanonicalField::Followers => Some(self.followers),
            _ => None,
        }
    }

    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Platform => Some(&self.platform),
            CanonicalField::ContentType => Some(&self.content_type),
            CanonicalField::Content => Some(&self.content),
            CanonicalField::UserType => Some(&self.user_type),
            CanonicalField::Sentiment => Some(&self.sentiment),
            _ => None,
        }
    }

    /// Renders the row in canonical column order.
    pub fn to_fields(&self) -> Vec<String> {
        CanonicalField::ALL
            .iter()
            .map(|field| match field {
                CanonicalField::Date => self.date.format(TIMESTAMP_FORMAT).to_string(),
                other => self
                    .metric(*other)
                    .map(crate::data::format_number)
                    .or_else(|| self.text(*other).map(str::to_string))
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// The canonical table after type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable {
    records: Vec<PostRecord>,
    lineage: [Vec<String>; 10],
    observed: [bool; 10],
    auxiliary: Vec<AuxiliaryColumn>,
    dropped: usize,
}

impl CleanTable {
    pub fn records(&self) -> &[PostRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows removed because their date could not be parsed.
    pub fn dropped_rows(&self) -> usize {
        self.dropped
    }

    pub fn lineage(&self, field: CanonicalField) -> &[String] {
        &self.lineage[field.index()]
    }

    /// `true` when the field came from the source and at least one surviving
    /// row held a usable value for it.
    pub fn is_observed(&self, field: CanonicalField) -> bool {
        self.observed[field.index()]
    }

    /// Source columns outside the canonical set, aligned with [`records`].
    ///
    /// [`records`]: CleanTable::records
    pub fn auxiliary(&self) -> &[AuxiliaryColumn] {
        &self.auxiliary
    }

    pub fn metric_series(&self, field: CanonicalField) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| record.metric(field))
            .collect()
    }
}

fn cell_at(columns: &[Vec<Cell>; 10], field: CanonicalField, row: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    columns[field.index()].get(row).unwrap_or(&EMPTY)
}

/// Merged metric cells always hold a number, so whether the field was seen
/// comes from the contributor columns kept as auxiliary.
fn contributor_parses(auxiliary: &[AuxiliaryColumn], sources: &[String], row: usize) -> bool {
    auxiliary
        .iter()
        .filter(|column| sources.contains(&column.name))
        .any(|column| column.values.get(row).and_then(Cell::as_metric).is_some())
}

/// Serializes as the list of records; lineage and auxiliary columns stay
/// in-process.
impl Serialize for CleanTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.records)
    }
}

/// Coerces every canonical column to its semantic type. Rows without a
/// parseable date are dropped; metrics default to zero and text to empty.
pub fn clean(table: CanonicalTable) -> CleanTable {
    let (columns, lineage, auxiliary, row_count) = table.into_parts();
    let cell = |field: CanonicalField, row: usize| cell_at(&columns, field, row);

    let mut kept_rows = Vec::with_capacity(row_count);
    let mut records = Vec::with_capacity(row_count);
    let mut observed = [false; 10];
    for row in 0..row_count {
        let date_cell = cell(CanonicalField::Date, row);
        let Some(timestamp) = parse_timestamp(&date_cell.as_text()) else {
            debug!("Dropping row {} with unusable date '{date_cell}'", row + 1);
            continue;
        };
        for field in CanonicalField::ALL {
            if lineage[field.index()].is_empty() {
                continue;
            }
            let usable = match field.semantic_type() {
                SemanticType::Timestamp => true,
                SemanticType::Metric if lineage[field.index()].len() > 1 => {
                    contributor_parses(&auxiliary, &lineage[field.index()], row)
                }
                SemanticType::Metric => cell(field, row).as_metric().is_some(),
                SemanticType::Category | SemanticType::FreeText => !cell(field, row).is_empty(),
            };
            observed[field.index()] |= usable;
        }
        let text = |field: CanonicalField| cell(field, row).as_text();
        let metric = |field: CanonicalField| cell(field, row).metric_or_zero();
        records.push(PostRecord {
            date: timestamp.value,
            has_time: timestamp.has_time,
            platform: text(CanonicalField::Platform),
            content_type: text(CanonicalField::ContentType),
            engagement: metric(CanonicalField::Engagement),
            reach: metric(CanonicalField::Reach),
            conversion: metric(CanonicalField::Conversion),
            content: text(CanonicalField::Content),
            user_type: text(CanonicalField::UserType),
            sentiment: text(CanonicalField::Sentiment),
            followers: metric(CanonicalField::Followers),
        });
        kept_rows.push(row);
    }

    let dropped = row_count - records.len();
    if dropped > 0 {
        warn!("Dropped {dropped} of {row_count} row(s) without a usable date");
    }
    let auxiliary = auxiliary
        .into_iter()
        .map(|column| AuxiliaryColumn {
            values: kept_rows
                .iter()
                .map(|row| column.values.get(*row).cloned().unwrap_or_default())
                .collect(),
            name: column.name,
        })
        .collect();

    CleanTable {
        records,
        lineage,
        observed,
        auxiliary,
        dropped,
    }
}
