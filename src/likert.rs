use std::sync::OnceLock;

use regex::Regex;

use crate::models::Intent;

/// Five-point labels in questionnaire order, most to least.
pub const LIKERT_LABELS: [(&str, u8); 5] = [
    ("มากที่สุด", 5),
    ("มาก", 4),
    ("ปานกลาง", 3),
    ("น้อย", 2),
    ("น้อยมาก", 1),
];

pub const YES_TOKEN: &str = "ใช่";
pub const HAS_TOKEN: &str = "มี";

type Matcher = fn(&str) -> Option<u8>;

/// Tried in order on trimmed, non-empty text; first hit wins.
pub const LIKERT_MATCHERS: [(&str, Matcher); 3] = [
    ("exact_label", exact_label),
    ("digit", first_digit),
    ("label_substring", label_substring),
];

fn digit_re() -> &'static Regex {
    static DIGIT_RE: OnceLock<Regex> = OnceLock::new();
    DIGIT_RE.get_or_init(|| Regex::new(r"[1-5]").expect("valid digit regex"))
}

pub fn exact_label(text: &str) -> Option<u8> {
    LIKERT_LABELS
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, score)| *score)
}

pub fn first_digit(text: &str) -> Option<u8> {
    digit_re()
        .find(text)
        .and_then(|m| m.as_str().parse::<u8>().ok())
}

/// Scans labels in table order, so "มาก" is found before "น้อยมาก".
pub fn label_substring(text: &str) -> Option<u8> {
    LIKERT_LABELS
        .iter()
        .find(|(label, _)| text.contains(label))
        .map(|(_, score)| *score)
}

pub fn normalize_to_1_5(raw: Option<&str>) -> Option<u8> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }
    LIKERT_MATCHERS.iter().find_map(|(name, matcher)| {
        let score = matcher(text)?;
        tracing::trace!(matcher = *name, score, "likert answer matched");
        Some(score)
    })
}

/// Strict closed-option check: only the exact positive token is `Yes`.
pub fn normalize_intent(raw: Option<&str>, positive: &str) -> Intent {
    match raw.map(str::trim) {
        None | Some("") => Intent::Unknown,
        Some(text) if text == positive => Intent::Yes,
        Some(_) => Intent::No,
    }
}
