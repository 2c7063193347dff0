use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::SurveyError;
use crate::models::QuestionId;

use CanonicalField as F;
use QuestionId::*;

/// Bumped whenever a built-in alias changes, so cached tables are re-normalized.
pub const BUILTIN_VERSION: &str = "opd-2024.3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Department,
    VisitType,
    OverallHealth,
    ReasonForVisit,
    Sex,
    Age,
    Hometown,
    Occupation,
    PayerType,
    ServiceDate,
    OverallSatisfaction,
    Item(QuestionId),
    WillReturn,
    WillRecommend,
    HasComplaint,
    ComplaintDetail,
    Expectation,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 26] = [
        CanonicalField::Department,
        CanonicalField::VisitType,
        CanonicalField::OverallHealth,
        CanonicalField::ReasonForVisit,
        CanonicalField::Sex,
        CanonicalField::Age,
        CanonicalField::Hometown,
        CanonicalField::Occupation,
        CanonicalField::PayerType,
        CanonicalField::ServiceDate,
        CanonicalField::OverallSatisfaction,
        CanonicalField::Item(QuestionId::Q1),
        CanonicalField::Item(QuestionId::Q2),
        CanonicalField::Item(QuestionId::Q3),
        CanonicalField::Item(QuestionId::Q4),
        CanonicalField::Item(QuestionId::Q5),
        CanonicalField::Item(QuestionId::Q6),
        CanonicalField::Item(QuestionId::Q7),
        CanonicalField::Item(QuestionId::Q8),
        CanonicalField::Item(QuestionId::Q9),
        CanonicalField::Item(QuestionId::Q10),
        CanonicalField::WillReturn,
        CanonicalField::WillRecommend,
        CanonicalField::HasComplaint,
        CanonicalField::ComplaintDetail,
        CanonicalField::Expectation,
    ];

    /// Stable English key, also accepted as a header.
    pub fn key(self) -> String {
        match self {
            CanonicalField::Department => "department".into(),
            CanonicalField::VisitType => "visit_type".into(),
            CanonicalField::OverallHealth => "overall_health".into(),
            CanonicalField::ReasonForVisit => "reason_for_visit".into(),
            CanonicalField::Sex => "sex".into(),
            CanonicalField::Age => "age".into(),
            CanonicalField::Hometown => "hometown".into(),
            CanonicalField::Occupation => "occupation".into(),
            CanonicalField::PayerType => "payer_type".into(),
            CanonicalField::ServiceDate => "service_date".into(),
            CanonicalField::OverallSatisfaction => "overall_satisfaction".into(),
            CanonicalField::Item(question) => format!("q{}", question.number()),
            CanonicalField::WillReturn => "will_return".into(),
            CanonicalField::WillRecommend => "will_recommend".into(),
            CanonicalField::HasComplaint => "has_complaint".into(),
            CanonicalField::ComplaintDetail => "complaint_detail".into(),
            CanonicalField::Expectation => "expectation_text".into(),
        }
    }

    pub fn from_key(key: &str) -> Result<Self, SurveyError> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(key))
            .ok_or_else(|| SurveyError::UnknownCanonicalField(key.to_string()))
    }
}

/// Google Form question wording, every revision seen so far.
const FORM_HEADERS: &[(&str, CanonicalField)] = &[
    ("หน่วยงานที่ท่านเข้ารับบริการ/ ต้องการประเมิน (เพื่อสะท้อนกลับหน่วยงานโดยตรง)", F::Department),
    ("1. ท่านมาใช้บริการ", F::VisitType),
    ("2. ท่านคิดว่าสุขภาพโดยรวมของท่านเป็นอย่างไร", F::OverallHealth),
    ("3. เหตุผลที่เลือกใช้บริการ", F::ReasonForVisit),
    ("ส่วนที่ 1 ข้อมูลทั่วไปของผู้ตอบแบบประเมิน\n1. เพศ", F::Sex),
    ("1. เพศ", F::Sex),
    ("2. อายุ", F::Age),
    ("3. ภูมิลำเนา", F::Hometown),
    ("4. อาชีพ", F::Occupation),
    ("5. สิทธิในการรักษา", F::PayerType),
    ("6. วันที่มารับบริการ", F::ServiceDate),
    ("ความพึงพอใจต่อบริการของโรงพยาบาลในภาพรวม", F::OverallSatisfaction),
    ("1. ขั้นตอนการติดต่อและเข้ารับการรักษาในโรงพยาบาล มีความสะดวกเพียงใด", F::Item(Q1)),
    ("2. ขั้นตอนการนัดหมายเพื่อเข้ารับบริการ มีความสะดวกเพียงใด", F::Item(Q2)),
    ("3. ท่านรู้สึกว่าระยะเวลารอคอยเพื่อพบแพทย์เหมาะสมเพียงใด", F::Item(Q3)),
    (
        "4. ในการรับบริการครั้งนี้ ทีมผู้รักษา(แพทย์ พยาบาลและเจ้าหน้าที่) รับฟังและเปิดโอกาสให้ท่านซักถามข้อสงสัยได้มากน้อยเพียงใด",
        F::Item(Q4),
    ),
    (
        "5. ในการรับบริการครั้งนี้ พยาบาลและเจ้าหน้าที่ให้ข้อมูลเกี่ยวกับขั้นตอนการรับบริการได้ชัดเจนเพียงใด",
        F::Item(Q5),
    ),
    (
        "6. ในการรับบริการครั้งนี้ ท่านรู้สึกว่าบุคลากรทุกคนดูแลท่านอย่างเท่าเทียมและให้เกียรติหรือไม่",
        F::Item(Q6),
    ),
    // The 2023 form misnumbered the cleanliness item as "5.".
    ("5. โรงพยาบาลมีความสะอาด และมีสิ่งอำนวยความสะดวกเพียงพอต่อความต้องการของท่าน", F::Item(Q7)),
    ("7. โรงพยาบาลมีความสะอาด และมีสิ่งอำนวยความสะดวกเพียงพอต่อความต้องการของท่าน", F::Item(Q7)),
    (
        "8. ก่อนรับบริการหรือการทำหัตถการ ท่านได้รับข้อมูลเกี่ยวกับค่าใช้จ่ายที่อาจเกิดขึ้น ชัดเจนเพียงใด",
        F::Item(Q8),
    ),
    ("9. ท่านได้รับข้อมูลการรักษา อาการแทรกซ้อนระหว่างการรักษาพยาบาล", F::Item(Q9)),
    (
        "10. ท่านได้รับคำแนะนำอย่างชัดเจน ถึงอาการผิดปกติ ที่ต้องกลับมาพบแพทย์ และการมาตรวจตามนัด",
        F::Item(Q10),
    ),
    (
        "1. หากท่านมีอาการเจ็บป่วย ท่านจะพิจารณากลับมารับบริการที่โรงพยาบาลแห่งนี้หรือไม่",
        F::WillReturn,
    ),
    (
        "2. หากมีโอกาสท่านจะแนะนำผู้อื่นให้มารับบริการที่โรงพยาบาลแห่งนี้หรือไม่",
        F::WillRecommend,
    ),
    ("3. ท่านมีความไม่พึงพอใจในการมาใช้บริการที่โรงพยาบาลนี้หรือไม่", F::HasComplaint),
    (
        "(หากมี) ความไม่พึงพอใจกรุณาระบุรายละเอียด เพื่อเป็นประโยชน์ในการปรับปรุง",
        F::ComplaintDetail,
    ),
    ("ความคาดหวังต่อบริการของโรงพยาบาลในภาพรวม", F::Expectation),
];

/// Short Thai column names used by cleaned spreadsheet exports.
const SHORT_HEADERS: &[(&str, CanonicalField)] = &[
    ("หน่วยงาน", F::Department),
    ("ประเภทการมา", F::VisitType),
    ("สุขภาพโดยรวม", F::OverallHealth),
    ("เหตุผลที่เลือก", F::ReasonForVisit),
    ("เพศ", F::Sex),
    ("อายุ", F::Age),
    ("ภูมิลำเนา", F::Hometown),
    ("อาชีพ", F::Occupation),
    ("สิทธิการรักษา", F::PayerType),
    ("วันที่รับบริการ", F::ServiceDate),
    ("ความพึงพอใจโดยรวม", F::OverallSatisfaction),
    ("Q1_ความสะดวกขั้นตอน", F::Item(Q1)),
    ("Q2_ความสะดวกนัดหมาย", F::Item(Q2)),
    ("Q3_ระยะเวลารอคอย", F::Item(Q3)),
    ("Q4_การรับฟัง", F::Item(Q4)),
    ("Q5_ความชัดเจนข้อมูล", F::Item(Q5)),
    ("Q6_ความเท่าเทียม", F::Item(Q6)),
    ("Q7_ความสะอาดและสิ่งอำนวยความสะดวก", F::Item(Q7)),
    ("Q8_ข้อมูลค่าใช้จ่าย", F::Item(Q8)),
    ("Q9_ข้อมูลการรักษา", F::Item(Q9)),
    ("Q10_คำแนะนำกลับบ้าน", F::Item(Q10)),
    ("กลับมารับบริการหรือไม่", F::WillReturn),
    ("แนะนำผู้อื่นหรือไม่", F::WillRecommend),
    ("มีความไม่พึงพอใจหรือไม่", F::HasComplaint),
    ("รายละเอียดความไม่พึงพอใจ", F::ComplaintDetail),
    ("ความคาดหวังต่อบริการ", F::Expectation),
];

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderAliasTable {
    version: String,
    entries: HashMap<String, CanonicalField>,
}

/// On-disk alias extension.
#[derive(Debug, Deserialize)]
struct AliasFile {
    version: String,
    aliases: BTreeMap<String, String>,
}

impl HeaderAliasTable {
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for (header, field) in FORM_HEADERS.iter().chain(SHORT_HEADERS) {
            entries.insert(header.trim().to_string(), *field);
        }
        for field in CanonicalField::ALL {
            entries.insert(field.key(), field);
        }
        Self {
            version: BUILTIN_VERSION.to_string(),
            entries,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Exact match on the trimmed header, no fuzzy matching.
    pub fn resolve(&self, header: &str) -> Option<CanonicalField> {
        self.entries.get(header.trim()).copied()
    }

    pub fn insert(&mut self, header: &str, field: CanonicalField) {
        self.entries.insert(header.trim().to_string(), field);
    }

    /// Adds the entries of a JSON alias file on top of this table.
    ///
    /// The file's `version` is appended to the table version so cached
    /// tables normalized with the old aliases are not reused.
    pub fn extend_from_json(&mut self, text: &str) -> Result<(), SurveyError> {
        let file: AliasFile = serde_json::from_str(text)?;
        if file.version.trim().is_empty() {
            return Err(SurveyError::AliasFile("version must not be empty".into()));
        }

        let mut resolved = Vec::with_capacity(file.aliases.len());
        for (header, key) in &file.aliases {
            if header.trim().is_empty() {
                return Err(SurveyError::AliasFile("header must not be empty".into()));
            }
            resolved.push((header, CanonicalField::from_key(key)?));
        }
        for (header, field) in resolved {
            self.insert(header, field);
        }

        self.version = format!("{}+{}", self.version, file.version.trim());
        Ok(())
    }
}

impl Default for HeaderAliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}
