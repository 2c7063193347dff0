use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::aliases::{CanonicalField, HeaderAliasTable};
use crate::error::SurveyError;
use crate::likert::{normalize_intent, normalize_to_1_5, HAS_TOKEN, YES_TOKEN};
use crate::models::{CanonicalRecord, NormalizedTable, QuestionId, RawCell, RawRecord, RawTable};

/// Time columns in order of preference, matched after alias resolution.
pub const TIME_COLUMN_PRIORITY: [&str; 4] = ["ประทับเวลา", "Timestamp", "เวลา", "service_date"];

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y, %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq)]
enum ColumnTarget {
    Field(CanonicalField),
    Passthrough(String),
}

impl ColumnTarget {
    fn name(&self) -> String {
        match self {
            ColumnTarget::Field(field) => field.key(),
            ColumnTarget::Passthrough(header) => header.clone(),
        }
    }
}

/// Day-first first, then ISO, then RFC 3339.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn cell_timestamp(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::DateTime(value) => Some(*value),
        RawCell::Text(text) => parse_timestamp(text),
        RawCell::Number(_) | RawCell::Empty => None,
    }
}

pub fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

pub fn normalize(
    table: &RawTable,
    aliases: &HeaderAliasTable,
) -> Result<NormalizedTable, SurveyError> {
    let targets: Vec<ColumnTarget> = table
        .headers
        .iter()
        .map(|header| match aliases.resolve(header) {
            Some(field) => ColumnTarget::Field(field),
            None => ColumnTarget::Passthrough(header.trim().to_string()),
        })
        .collect();

    let (time_index, time_column) = TIME_COLUMN_PRIORITY
        .iter()
        .find_map(|candidate| {
            targets
                .iter()
                .position(|target| target.name() == *candidate)
                .map(|index| (index, candidate.to_string()))
        })
        .ok_or_else(|| SurveyError::NoTimeColumn {
            expected: TIME_COLUMN_PRIORITY.join(", "),
            headers: targets
                .iter()
                .map(ColumnTarget::name)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let unrecognized_headers: Vec<String> = targets
        .iter()
        .enumerate()
        .filter_map(|(index, target)| match target {
            ColumnTarget::Passthrough(header) if index != time_index => Some(header.clone()),
            _ => None,
        })
        .collect();

    tracing::debug!(
        time_column = %time_column,
        aliases = aliases.version(),
        unrecognized = unrecognized_headers.len(),
        "resolved columns"
    );
    for header in &unrecognized_headers {
        tracing::debug!(header = %header, "passing through unrecognized column");
    }

    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for (row_number, row) in table.rows.iter().enumerate() {
        let Some(timestamp) = cell_timestamp(row.cell(time_index)) else {
            tracing::debug!(row = row_number + 1, "dropping row with unparseable date");
            dropped += 1;
            continue;
        };
        records.push(build_record(row, &targets, time_index, timestamp));
    }

    if dropped > 0 {
        tracing::warn!(
            dropped,
            kept = records.len(),
            time_column = %time_column,
            "rows dropped for unparseable dates"
        );
    }

    Ok(NormalizedTable {
        records,
        dropped,
        time_column,
        unrecognized_headers,
    })
}

fn build_record(
    row: &RawRecord,
    targets: &[ColumnTarget],
    time_index: usize,
    timestamp: NaiveDateTime,
) -> CanonicalRecord {
    // Several columns can alias one field in a merged export; the first
    // non-empty one wins.
    let mut fields: HashMap<CanonicalField, String> = HashMap::new();
    let mut extra = BTreeMap::new();

    for (index, target) in targets.iter().enumerate() {
        let cell = row.cell(index);
        let Some(text) = cell.as_text() else {
            continue;
        };
        match target {
            // Free-text answers are kept as written.
            ColumnTarget::Field(
                field @ (CanonicalField::ComplaintDetail | CanonicalField::Expectation),
            ) => {
                fields.entry(*field).or_insert_with(|| cell.as_verbatim().unwrap_or(text));
            }
            ColumnTarget::Field(field) => {
                fields.entry(*field).or_insert(text);
            }
            ColumnTarget::Passthrough(_) if index == time_index => {}
            ColumnTarget::Passthrough(header) => {
                extra.entry(header.clone()).or_insert(text);
            }
        }
    }

    let text = |field: CanonicalField| fields.get(&field).cloned();
    let raw = |field: CanonicalField| fields.get(&field).map(String::as_str);

    let item_scores = QuestionId::ALL
        .into_iter()
        .map(|question| (question, normalize_to_1_5(raw(CanonicalField::Item(question)))))
        .collect();

    let month = timestamp.month();

    CanonicalRecord {
        department: text(CanonicalField::Department),
        visit_type: text(CanonicalField::VisitType),
        overall_health: text(CanonicalField::OverallHealth),
        reason_for_visit: text(CanonicalField::ReasonForVisit),
        sex: text(CanonicalField::Sex),
        age: text(CanonicalField::Age),
        hometown: text(CanonicalField::Hometown),
        occupation: text(CanonicalField::Occupation),
        payer_type: text(CanonicalField::PayerType),
        service_date: text(CanonicalField::ServiceDate),
        timestamp,
        month,
        quarter: quarter_of(month),
        year: timestamp.year(),
        overall_satisfaction_score: normalize_to_1_5(raw(CanonicalField::OverallSatisfaction)),
        item_scores,
        will_return: normalize_intent(raw(CanonicalField::WillReturn), YES_TOKEN),
        will_recommend: normalize_intent(raw(CanonicalField::WillRecommend), YES_TOKEN),
        has_complaint: normalize_intent(raw(CanonicalField::HasComplaint), HAS_TOKEN),
        complaint_detail: text(CanonicalField::ComplaintDetail),
        expectation_text: text(CanonicalField::Expectation),
        extra,
    }
}
