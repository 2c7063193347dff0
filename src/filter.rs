use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::SurveyError;
use crate::models::CanonicalRecord;

pub const THAI_MONTHS: [&str; 12] = [
    "ม.ค.", "ก.พ.", "มี.ค.", "เม.ย.", "พ.ค.", "มิ.ย.", "ก.ค.", "ส.ค.", "ก.ย.", "ต.ค.", "พ.ย.", "ธ.ค.",
];

pub fn month_label(month: u32) -> String {
    usize::try_from(month)
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|index| THAI_MONTHS.get(index))
        .map(|label| label.to_string())
        .unwrap_or_else(|| month.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DepartmentFilter {
    #[default]
    All,
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    All,
    Year(i32),
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    pub fn contains(&self, record: &CanonicalRecord) -> bool {
        match *self {
            Period::All => true,
            Period::Year(year) => record.year == year,
            Period::Quarter { year, quarter } => record.year == year && record.quarter == quarter,
            Period::Month { year, month } => record.year == year && record.month == month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub department: DepartmentFilter,
    pub period: Period,
}

impl FilterSelection {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        let department_ok = match &self.department {
            DepartmentFilter::All => true,
            DepartmentFilter::Named(name) => record.department.as_deref() == Some(name.as_str()),
        };
        department_ok && self.period.contains(record)
    }

    pub fn is_all_departments(&self) -> bool {
        self.department == DepartmentFilter::All
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.department {
            DepartmentFilter::All => write!(f, "ภาพรวมทั้งหมด")?,
            DepartmentFilter::Named(name) => write!(f, "{name}")?,
        }
        match self.period {
            Period::All => write!(f, ", ทุกช่วงเวลา"),
            Period::Year(year) => write!(f, ", ปี {year}"),
            Period::Quarter { year, quarter } => write!(f, ", ไตรมาส {quarter}/{year}"),
            Period::Month { year, month } => write!(f, ", {} {year}", month_label(month)),
        }
    }
}

pub fn filter<'a>(
    records: &'a [CanonicalRecord],
    selection: &FilterSelection,
) -> Vec<&'a CanonicalRecord> {
    records
        .iter()
        .filter(|record| selection.matches(record))
        .collect()
}

/// Like [`filter`], but an empty result is an error the caller can show.
pub fn select<'a>(
    records: &'a [CanonicalRecord],
    selection: &FilterSelection,
) -> Result<Vec<&'a CanonicalRecord>, SurveyError> {
    let selected = filter(records, selection);
    if selected.is_empty() {
        return Err(SurveyError::EmptyFilterResult {
            selection: selection.to_string(),
        });
    }
    Ok(selected)
}

/// Values offered by the department and period pickers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub departments: Vec<String>,
    pub years: Vec<i32>,
    pub quarters: BTreeMap<i32, Vec<u32>>,
    pub months: BTreeMap<i32, Vec<u32>>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

impl FilterOptions {
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let mut departments = BTreeSet::new();
        let mut quarters: BTreeMap<i32, BTreeSet<u32>> = BTreeMap::new();
        let mut months: BTreeMap<i32, BTreeSet<u32>> = BTreeMap::new();

        for record in records {
            if let Some(department) = &record.department {
                departments.insert(department.clone());
            }
            quarters.entry(record.year).or_default().insert(record.quarter);
            months.entry(record.year).or_default().insert(record.month);
        }

        Self {
            departments: departments.into_iter().collect(),
            years: quarters.keys().rev().copied().collect(),
            quarters: quarters
                .into_iter()
                .map(|(year, set)| (year, set.into_iter().collect()))
                .collect(),
            months: months
                .into_iter()
                .map(|(year, set)| (year, set.into_iter().collect()))
                .collect(),
            first_timestamp: records.iter().map(|r| r.timestamp).min(),
            last_timestamp: records.iter().map(|r| r.timestamp).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Intent, QuestionId};
    use chrono::{Datelike, NaiveDate};

    fn record(department: &str, year: i32, month: u32, day: u32) -> CanonicalRecord {
        let timestamp = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        CanonicalRecord {
            department: (!department.is_empty()).then(|| department.to_string()),
            visit_type: None,
            overall_health: None,
            reason_for_visit: None,
            sex: None,
            age: None,
            hometown: None,
            occupation: None,
            payer_type: None,
            service_date: None,
            timestamp,
            month: timestamp.month(),
            quarter: crate::normalize::quarter_of(timestamp.month()),
            year: timestamp.year(),
            overall_satisfaction_score: None,
            item_scores: QuestionId::ALL.into_iter().map(|q| (q, None)).collect(),
            will_return: Intent::Unknown,
            will_recommend: Intent::Unknown,
            has_complaint: Intent::Unknown,
            complaint_detail: None,
            expectation_text: None,
            extra: BTreeMap::new(),
        }
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            record("OPD", 2023, 11, 2),
            record("ER", 2024, 1, 15),
            record("OPD", 2024, 2, 20),
            record("OPD", 2024, 5, 1),
            record("", 2024, 5, 9),
        ]
    }

    #[test]
    fn all_selection_is_identity() {
        let records = sample();
        assert_eq!(filter(&records, &FilterSelection::default()).len(), records.len());
    }

    #[test]
    fn period_filters_compose_with_department() {
        let records = sample();
        let quarter_one = FilterSelection {
            department: DepartmentFilter::Named("OPD".into()),
            period: Period::Quarter { year: 2024, quarter: 1 },
        };
        let selected = filter(&records, &quarter_one);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].month, 2);

        let may = FilterSelection {
            department: DepartmentFilter::All,
            period: Period::Month { year: 2024, month: 5 },
        };
        assert_eq!(filter(&records, &may).len(), 2);

        let year = FilterSelection {
            department: DepartmentFilter::All,
            period: Period::Year(2023),
        };
        assert_eq!(filter(&records, &year).len(), 1);
    }

    #[test]
    fn empty_selection_is_distinguishable() {
        let records = sample();
        let selection = FilterSelection {
            department: DepartmentFilter::Named("ทันตกรรม".into()),
            period: Period::All,
        };
        let err = select(&records, &selection).unwrap_err();
        assert!(matches!(err, SurveyError::EmptyFilterResult { selection } if selection.contains("ทันตกรรม")));
    }

    #[test]
    fn options_list_departments_and_periods() {
        let options = FilterOptions::from_records(&sample());
        assert_eq!(options.departments, vec!["ER", "OPD"]);
        assert_eq!(options.years, vec![2024, 2023]);
        assert_eq!(options.quarters[&2024], vec![1, 2]);
        assert_eq!(options.months[&2024], vec![1, 2, 5]);
        assert_eq!(options.first_timestamp.map(|t| t.year()), Some(2023));
    }

    #[test]
    fn selection_labels_use_thai_months() {
        let selection = FilterSelection {
            department: DepartmentFilter::All,
            period: Period::Month { year: 2024, month: 3 },
        };
        assert_eq!(selection.to_string(), "ภาพรวมทั้งหมด, มี.ค. 2024");
        assert_eq!(month_label(13), "13");
    }
}
