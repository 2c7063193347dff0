use std::collections::{BTreeMap, HashMap};

use crate::models::{CanonicalRecord, DepartmentCount, Intent, MetricBundle, QuestionId};

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    total: u64,
    count: u64,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<u8>) {
        if let Some(value) = value {
            self.total += u64::from(value);
            self.count += 1;
        }
    }

    fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.total as f64 / self.count as f64)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RateAccumulator {
    positive: u64,
    answered: u64,
}

impl RateAccumulator {
    fn push(&mut self, intent: Intent) {
        match intent {
            Intent::Yes => {
                self.positive += 1;
                self.answered += 1;
            }
            Intent::No => self.answered += 1,
            Intent::Unknown => {}
        }
    }

    fn percent(self) -> Option<f64> {
        (self.answered > 0).then(|| self.positive as f64 / self.answered as f64 * 100.0)
    }
}

/// Counts values keeping first-seen order, so ties resolve to the earliest.
#[derive(Debug, Default)]
struct OrderedCounter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl OrderedCounter {
    fn push(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match self.counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                self.order.push(value.to_string());
                self.counts.insert(value.to_string(), 1);
            }
        }
    }

    /// Descending by count; a stable sort keeps first-seen order for ties.
    fn into_sorted(self) -> Vec<(String, usize)> {
        let mut counts = self.counts;
        let mut values: Vec<(String, usize)> = self
            .order
            .into_iter()
            .map(|value| {
                let count = counts.remove(&value).unwrap_or_default();
                (value, count)
            })
            .collect();
        values.sort_by(|a, b| b.1.cmp(&a.1));
        values
    }
}

pub fn aggregate<'a, I>(records: I) -> MetricBundle
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let mut respondent_count = 0usize;
    let mut satisfaction = MeanAccumulator::default();
    let mut items: BTreeMap<QuestionId, MeanAccumulator> = QuestionId::ALL
        .into_iter()
        .map(|question| (question, MeanAccumulator::default()))
        .collect();
    let mut will_return = RateAccumulator::default();
    let mut will_recommend = RateAccumulator::default();
    let mut has_complaint = RateAccumulator::default();
    let mut health = OrderedCounter::default();
    let mut departments = OrderedCounter::default();
    let mut rating_histogram: BTreeMap<u8, usize> = (1..=5).map(|bucket| (bucket, 0)).collect();

    for record in records {
        respondent_count += 1;

        satisfaction.push(record.overall_satisfaction_score);
        if let Some(score) = record.overall_satisfaction_score {
            let bucket = f64::from(score).round().clamp(1.0, 5.0) as u8;
            *rating_histogram.entry(bucket).or_insert(0) += 1;
        }

        for (question, accumulator) in items.iter_mut() {
            accumulator.push(record.item_score(*question));
        }

        will_return.push(record.will_return);
        will_recommend.push(record.will_recommend);
        has_complaint.push(record.has_complaint);
        health.push(record.overall_health.as_deref());
        departments.push(record.department.as_deref());
    }

    MetricBundle {
        respondent_count,
        mean_satisfaction: satisfaction.mean(),
        satisfaction_answered: satisfaction.count as usize,
        modal_health_status: health.into_sorted().into_iter().next().map(|(value, _)| value),
        return_rate: will_return.percent(),
        return_answered: will_return.answered as usize,
        recommend_rate: will_recommend.percent(),
        recommend_answered: will_recommend.answered as usize,
        complaint_rate: has_complaint.percent(),
        complaint_answered: has_complaint.answered as usize,
        item_counts: items
            .iter()
            .map(|(question, accumulator)| (*question, accumulator.count as usize))
            .collect(),
        item_means: items
            .into_iter()
            .map(|(question, accumulator)| (question, accumulator.mean()))
            .collect(),
        rating_histogram,
        department_counts: departments
            .into_sorted()
            .into_iter()
            .map(|(department, count)| DepartmentCount { department, count })
            .collect(),
    }
}

/// "N/A" when the rate has no denominator.
pub fn format_rate(rate: Option<f64>, decimals: usize) -> String {
    match rate {
        Some(value) => format!("{value:.decimals$}%"),
        None => "N/A".to_string(),
    }
}

pub fn format_mean(mean: Option<f64>) -> String {
    match mean {
        Some(value) => format!("{value:.2}"),
        None => "N/A".to_string(),
    }
}
