use std::fmt::Write;

use crate::filter::{FilterOptions, FilterSelection};
use crate::metrics::{self, format_mean, format_rate};
use crate::models::{CanonicalRecord, MetricBundle, QuestionId};

/// Respondents who said there was nothing to complain about.
const NO_COMPLAINT_TEXT: &str = "ไม่มี";

#[derive(Debug, Clone, PartialEq)]
pub struct FreeTextEntry {
    pub department: Option<String>,
    pub text: String,
}

pub fn complaint_entries(records: &[&CanonicalRecord]) -> Vec<FreeTextEntry> {
    records
        .iter()
        .filter_map(|record| {
            let text = record.complaint_detail.as_ref()?;
            let trimmed = text.trim();
            (!trimmed.is_empty() && trimmed != NO_COMPLAINT_TEXT).then(|| FreeTextEntry {
                department: record.department.clone(),
                text: text.clone(),
            })
        })
        .collect()
}

pub fn expectation_entries(records: &[&CanonicalRecord]) -> Vec<FreeTextEntry> {
    records
        .iter()
        .filter_map(|record| {
            record.expectation_text.as_ref().map(|text| FreeTextEntry {
                department: record.department.clone(),
                text: text.clone(),
            })
        })
        .collect()
}

fn with_count(value: String, answered: usize) -> String {
    format!("{value} (n = {answered})")
}

/// Scorecard lines shared by the report and the `summary` command.
pub fn scorecard(bundle: &MetricBundle) -> Vec<(&'static str, String)> {
    vec![
        ("ผู้ตอบแบบประเมิน", bundle.respondent_count.to_string()),
        (
            "คะแนนความพึงพอใจเฉลี่ย",
            with_count(format_mean(bundle.mean_satisfaction), bundle.satisfaction_answered),
        ),
        (
            "สุขภาพโดยรวมที่พบบ่อย",
            bundle
                .modal_health_status
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        (
            "กลับมารับบริการ",
            with_count(format_rate(bundle.return_rate, 1), bundle.return_answered),
        ),
        (
            "แนะนำผู้อื่น",
            with_count(format_rate(bundle.recommend_rate, 1), bundle.recommend_answered),
        ),
        (
            "ไม่พึงพอใจ",
            with_count(format_rate(bundle.complaint_rate, 2), bundle.complaint_answered),
        ),
    ]
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn build_report(
    selection: &FilterSelection,
    options: &FilterOptions,
    records: &[&CanonicalRecord],
) -> String {
    let bundle = metrics::aggregate(records.iter().copied());
    let mut output = String::new();

    let _ = writeln!(output, "# Patient Experience Report (OPD)");
    let _ = writeln!(output, "Selection: {}", selection);
    if let (Some(first), Some(last)) = (options.first_timestamp, options.last_timestamp) {
        let _ = writeln!(
            output,
            "Data range: {} - {}",
            first.format("%d %b %Y"),
            last.format("%d %b %Y")
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Scorecard");
    for (label, value) in scorecard(&bundle) {
        let _ = writeln!(output, "- {}: {}", label, value);
    }

    if selection.is_all_departments() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Responses by Department");
        if bundle.department_counts.is_empty() {
            let _ = writeln!(output, "No department recorded in this selection.");
        } else {
            let _ = writeln!(output, "| หน่วยงาน | จำนวนการประเมิน |");
            let _ = writeln!(output, "| --- | --- |");
            for entry in &bundle.department_counts {
                let _ = writeln!(
                    output,
                    "| {} | {} |",
                    escape_cell(&entry.department),
                    entry.count
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution of Ratings (1-5)");
    for (bucket, count) in &bundle.rating_histogram {
        let _ = writeln!(output, "- {}: {}", bucket, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Satisfaction by Item");
    for question in QuestionId::ALL {
        let mean = bundle.item_means.get(&question).copied().flatten();
        let answered = bundle.item_counts.get(&question).copied().unwrap_or_default();
        let _ = writeln!(
            output,
            "- {}. {}: {}",
            question.number(),
            question.title(),
            with_count(format_mean(mean), answered)
        );
    }

    write_free_text(
        &mut output,
        "รายละเอียดความไม่พึงพอใจ",
        &complaint_entries(records),
        "No complaint details in this selection.",
    );
    write_free_text(
        &mut output,
        "ความคาดหวังต่อบริการของโรงพยาบาลในภาพรวม",
        &expectation_entries(records),
        "No expectations recorded in this selection.",
    );

    output
}

fn write_free_text(output: &mut String, title: &str, entries: &[FreeTextEntry], empty: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {}", title);

    if entries.is_empty() {
        let _ = writeln!(output, "{}", empty);
        return;
    }

    for entry in entries {
        match &entry.department {
            Some(department) => {
                let _ = writeln!(output, "- ({}) {}", department, escape_cell(&entry.text));
            }
            None => {
                let _ = writeln!(output, "- {}", escape_cell(&entry.text));
            }
        }
    }
}
