use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// A single cell as it came out of the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl RawCell {
    /// Builds a cell from delimited text; whitespace-only text is empty.
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }

    /// Trimmed textual form, `None` when the cell is empty.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            RawCell::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    Some(format!("{}", *value as i64))
                } else {
                    Some(value.to_string())
                }
            }
            RawCell::DateTime(value) => Some(value.format("%d/%m/%Y %H:%M:%S").to_string()),
        }
    }

    /// Like `as_text`, but text cells keep their surrounding whitespace.
    pub fn as_verbatim(&self) -> Option<String> {
        match self {
            RawCell::Text(value) if !value.trim().is_empty() => Some(value.clone()),
            _ => self.as_text(),
        }
    }
}

static EMPTY_CELL: RawCell = RawCell::Empty;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub cells: Vec<RawCell>,
}

impl RawRecord {
    pub fn new(cells: Vec<RawCell>) -> Self {
        Self { cells }
    }

    /// Ragged rows are padded on read: a missing trailing cell is empty.
    pub fn cell(&self, index: usize) -> &RawCell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

/// A decoded table before normalization. Headers are kept in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

/// The ten questionnaire items of the service-satisfaction section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QuestionId {
    Q1,
    Q2,
    Q3,
    Q4,
    Q5,
    Q6,
    Q7,
    Q8,
    Q9,
    Q10,
}

impl QuestionId {
    pub const ALL: [QuestionId; 10] = [
        QuestionId::Q1,
        QuestionId::Q2,
        QuestionId::Q3,
        QuestionId::Q4,
        QuestionId::Q5,
        QuestionId::Q6,
        QuestionId::Q7,
        QuestionId::Q8,
        QuestionId::Q9,
        QuestionId::Q10,
    ];

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Dashboard heading for the item gauge.
    pub fn title(self) -> &'static str {
        match self {
            QuestionId::Q1 => "ความสะดวกขั้นตอนการติดต่อและเข้ารับบริการ",
            QuestionId::Q2 => "ความสะดวกขั้นตอนการนัดหมาย",
            QuestionId::Q3 => "ความเหมาะสมของระยะเวลารอคอยพบแพทย์",
            QuestionId::Q4 => "การรับฟังและเปิดโอกาสให้ซักถามโดยทีมผู้รักษา",
            QuestionId::Q5 => "ความชัดเจนของข้อมูลขั้นตอนบริการ",
            QuestionId::Q6 => "การดูแลอย่างเท่าเทียมและให้เกียรติ",
            QuestionId::Q7 => "ความสะอาดและสิ่งอำนวยความสะดวก",
            QuestionId::Q8 => "ความชัดเจนของข้อมูลค่าใช้จ่าย",
            QuestionId::Q9 => "การได้รับข้อมูลการรักษาและอาการแทรกซ้อน",
            QuestionId::Q10 => "ความชัดเจนของคำแนะนำเมื่อกลับบ้าน",
        }
    }
}

/// Answer to a closed yes/no style question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Yes,
    No,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub department: Option<String>,
    pub visit_type: Option<String>,
    pub overall_health: Option<String>,
    pub reason_for_visit: Option<String>,
    pub sex: Option<String>,
    pub age: Option<String>,
    pub hometown: Option<String>,
    pub occupation: Option<String>,
    pub payer_type: Option<String>,
    pub service_date: Option<String>,
    pub timestamp: NaiveDateTime,
    pub month: u32,
    pub quarter: u32,
    pub year: i32,
    pub overall_satisfaction_score: Option<u8>,
    pub item_scores: BTreeMap<QuestionId, Option<u8>>,
    pub will_return: Intent,
    pub will_recommend: Intent,
    pub has_complaint: Intent,
    pub complaint_detail: Option<String>,
    pub expectation_text: Option<String>,
    /// Values of columns the alias table does not know, keyed by header.
    pub extra: BTreeMap<String, String>,
}

impl CanonicalRecord {
    pub fn item_score(&self, question: QuestionId) -> Option<u8> {
        self.item_scores.get(&question).copied().flatten()
    }
}

/// Output of one normalizer pass over a raw table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTable {
    pub records: Vec<CanonicalRecord>,
    pub dropped: usize,
    pub time_column: String,
    pub unrecognized_headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBundle {
    pub respondent_count: usize,
    pub mean_satisfaction: Option<f64>,
    /// Records with a defined overall satisfaction score.
    pub satisfaction_answered: usize,
    pub modal_health_status: Option<String>,
    pub return_rate: Option<f64>,
    pub return_answered: usize,
    pub recommend_rate: Option<f64>,
    pub recommend_answered: usize,
    pub complaint_rate: Option<f64>,
    pub complaint_answered: usize,
    pub item_means: BTreeMap<QuestionId, Option<f64>>,
    pub item_counts: BTreeMap<QuestionId, usize>,
    pub rating_histogram: BTreeMap<u8, usize>,
    pub department_counts: Vec<DepartmentCount>,
}
