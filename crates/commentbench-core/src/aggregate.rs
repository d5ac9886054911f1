//! Determinism aggregation: per-record field agreement and dataset rollups.
//!
//! A record's runs are scored field by field against its truth. The per-record
//! results are then folded into a [`DeterminismSummary`] through
//! [`SummaryFold`], a pure reducer, so a full recompute and an incremental
//! update go through the same code.

use std::collections::HashSet;

use serde::Serialize;

use crate::latency::{LatencyStats, usable};
use crate::model::{Labels, Run, TrackedField};
use crate::normalize::Symbol;

/// Occurrences of one normalized value across a record's runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Symbol,
    pub count: usize,
}

/// Agreement of one field's predictions with its truth, over a set of runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAgreement {
    pub truth_value: Symbol,
    pub match_count: usize,
    pub total: usize,
    pub match_rate: f64,
    /// Sorted by count, descending. Ties keep first-seen order.
    pub distribution: Vec<ValueCount>,
}

impl FieldAgreement {
    /// Count `observed` values against `truth_value`.
    ///
    /// Returns `None` when nothing was observed.
    pub fn tally<I>(truth_value: Symbol, observed: I) -> Option<Self>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut distribution: Vec<ValueCount> = Vec::new();
        let mut match_count = 0;
        let mut total = 0;

        for value in observed {
            total += 1;
            if value == truth_value {
                match_count += 1;
            }
            match distribution.iter_mut().find(|entry| entry.value == value) {
                Some(entry) => entry.count += 1,
                None => distribution.push(ValueCount { value, count: 1 }),
            }
        }

        if total == 0 {
            return None;
        }

        // Stable sort keeps insertion order among equal counts.
        distribution.sort_by(|a, b| b.count.cmp(&a.count));

        Some(Self {
            truth_value,
            match_count,
            total,
            match_rate: match_count as f64 / total as f64,
            distribution,
        })
    }

    /// Occurrences of `value` in the distribution (0 if never observed).
    pub fn count_of(&self, value: &Symbol) -> usize {
        self.distribution
            .iter()
            .find(|entry| &entry.value == value)
            .map_or(0, |entry| entry.count)
    }
}

/// Determinism statistics for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordStats {
    pub total_runs: usize,
    pub patient_prioritized: FieldAgreement,
    pub patient_ready: FieldAgreement,
    pub patient_short_notice: FieldAgreement,
    /// Presence-only agreement of `availability_periods`.
    pub availability: FieldAgreement,
    /// Distinct combinations of the four normalized values.
    pub unique_outcomes: usize,
    pub is_deterministic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
    #[serde(skip)]
    latency_samples: Vec<f64>,
}

impl RecordStats {
    pub fn field(&self, field: TrackedField) -> &FieldAgreement {
        match field {
            TrackedField::PatientPrioritized => &self.patient_prioritized,
            TrackedField::PatientReady => &self.patient_ready,
            TrackedField::PatientShortNotice => &self.patient_short_notice,
            TrackedField::Availability => &self.availability,
        }
    }

    /// Usable latencies of the underlying runs, in attempt order.
    pub fn latency_samples(&self) -> &[f64] {
        &self.latency_samples
    }
}

/// Score a record's runs against its truth.
///
/// An empty run list yields `None`: the record is not measured yet, which is
/// different from a zero score.
pub fn record_stats(truth: &Labels, runs: &[Run]) -> Option<RecordStats> {
    let [prioritized, ready, short_notice, availability] = TrackedField::ALL.map(|field| {
        FieldAgreement::tally(
            truth.symbol(field),
            runs.iter().map(|run| run.prediction.labels.symbol(field)),
        )
    });

    let unique_outcomes = runs
        .iter()
        .map(|run| run.prediction.labels.outcome())
        .collect::<HashSet<_>>()
        .len();

    let latency_samples: Vec<f64> = runs
        .iter()
        .filter_map(|run| run.latency_ms)
        .filter(|v| usable(*v))
        .collect();

    Some(RecordStats {
        total_runs: runs.len(),
        patient_prioritized: prioritized?,
        patient_ready: ready?,
        patient_short_notice: short_notice?,
        availability: availability?,
        unique_outcomes,
        is_deterministic: unique_outcomes == 1,
        latency: LatencyStats::from_samples(&latency_samples),
        latency_samples,
    })
}

/// Dataset-wide rollup of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRollup {
    /// Mean of per-row match rates over rows with at least one run.
    pub average_match_rate: Option<f64>,
    /// Minimum per-row match rate over the same rows.
    pub worst_match_rate: Option<f64>,
    pub rows_measured: usize,
}

/// Per-field rollups keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRollups {
    pub patient_prioritized: FieldRollup,
    pub patient_ready: FieldRollup,
    pub patient_short_notice: FieldRollup,
    pub availability: FieldRollup,
}

impl FieldRollups {
    pub fn field(&self, field: TrackedField) -> &FieldRollup {
        match field {
            TrackedField::PatientPrioritized => &self.patient_prioritized,
            TrackedField::PatientReady => &self.patient_ready,
            TrackedField::PatientShortNotice => &self.patient_short_notice,
            TrackedField::Availability => &self.availability,
        }
    }
}

/// Dataset-wide determinism summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterminismSummary {
    pub total_rows: usize,
    pub rows_with_runs: usize,
    pub total_runs: usize,
    /// Rows whose runs all produced the same outcome.
    pub deterministic_rows: usize,
    pub fields: FieldRollups,
    /// Computed over every run of every row, not averaged per row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

#[derive(Debug, Clone, Copy, Default)]
struct RateFold {
    sum: f64,
    worst: Option<f64>,
    rows: usize,
}

impl RateFold {
    fn push(&mut self, rate: f64) {
        self.sum += rate;
        self.worst = Some(self.worst.map_or(rate, |w| w.min(rate)));
        self.rows += 1;
    }

    fn rollup(&self) -> FieldRollup {
        FieldRollup {
            average_match_rate: (self.rows > 0).then(|| self.sum / self.rows as f64),
            worst_match_rate: self.worst,
            rows_measured: self.rows,
        }
    }
}

/// Partial dataset summary. Fold rows in, then [`finish`](Self::finish).
#[derive(Debug, Clone, Default)]
pub struct SummaryFold {
    total_rows: usize,
    rows_with_runs: usize,
    total_runs: usize,
    deterministic_rows: usize,
    fields: [RateFold; 4],
    latency_samples: Vec<f64>,
}

impl SummaryFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one dataset row. `None` is a row without runs: it counts towards
    /// `total_rows` only and never towards averages or minimums.
    pub fn fold(mut self, row: Option<&RecordStats>) -> Self {
        self.total_rows += 1;
        let Some(stats) = row else {
            return self;
        };

        self.rows_with_runs += 1;
        self.total_runs += stats.total_runs;
        if stats.is_deterministic {
            self.deterministic_rows += 1;
        }
        for field in TrackedField::ALL {
            self.fields[field.index()].push(stats.field(field).match_rate);
        }
        self.latency_samples.extend_from_slice(stats.latency_samples());
        self
    }

    pub fn finish(&self) -> DeterminismSummary {
        DeterminismSummary {
            total_rows: self.total_rows,
            rows_with_runs: self.rows_with_runs,
            total_runs: self.total_runs,
            deterministic_rows: self.deterministic_rows,
            fields: FieldRollups {
                patient_prioritized: self.fields[0].rollup(),
                patient_ready: self.fields[1].rollup(),
                patient_short_notice: self.fields[2].rollup(),
                availability: self.fields[3].rollup(),
            },
            latency: LatencyStats::from_samples(&self.latency_samples),
        }
    }
}

/// Fold every row into a fresh summary.
pub fn summarize<'a, I>(rows: I) -> DeterminismSummary
where
    I: IntoIterator<Item = Option<&'a RecordStats>>,
{
    rows.into_iter()
        .fold(SummaryFold::new(), SummaryFold::fold)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Availability, DateRange, FieldValue, Prediction};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn run(attempt: u32, labels: Labels, latency_ms: Option<f64>) -> Run {
        Run {
            record_id: "1".into(),
            attempt,
            prediction: Prediction {
                labels,
                reasoning: None,
            },
            latency_ms,
            start_time: Utc.with_ymd_and_hms(2025, 9, 8, 10, 0, attempt).unwrap(),
            end_time: None,
            status_code: Some(200),
        }
    }

    fn prioritized(value: Option<bool>) -> Labels {
        Labels {
            patient_prioritized: value.into(),
            ..Labels::default()
        }
    }

    fn periods(start_month: u32) -> Availability {
        Availability::Periods(vec![DateRange {
            kind: "available".into(),
            start_date: NaiveDate::from_ymd_opt(2025, start_month, 1),
            end_date: None,
        }])
    }

    fn scenario_truth() -> Labels {
        Labels {
            patient_prioritized: FieldValue::Bool(true),
            patient_ready: FieldValue::Absent,
            patient_short_notice: FieldValue::Bool(true),
            availability_periods: Availability::Absent,
        }
    }

    #[test]
    fn empty_runs_are_not_measured() {
        assert!(record_stats(&scenario_truth(), &[]).is_none());
        assert!(FieldAgreement::tally(Symbol::True, Vec::new()).is_none());
    }

    #[test]
    fn five_run_batch_scenario() {
        let values = [Some(true), None, Some(true), Some(true), Some(false)];
        let runs: Vec<Run> = values
            .iter()
            .enumerate()
            .map(|(i, v)| run(i as u32 + 1, prioritized(*v), Some(100.0)))
            .collect();

        let stats = record_stats(&scenario_truth(), &runs).unwrap();
        let field = &stats.patient_prioritized;
        assert_eq!(field.truth_value, Symbol::True);
        assert_eq!(field.match_count, 3);
        assert_eq!(field.total, 5);
        assert_eq!(field.match_rate, 0.6);
        assert_eq!(
            field.distribution,
            vec![
                ValueCount { value: Symbol::True, count: 3 },
                ValueCount { value: Symbol::Null, count: 1 },
                ValueCount { value: Symbol::False, count: 1 },
            ]
        );
    }

    #[test]
    fn four_of_five_true_scenario() {
        let values = [Some(true), Some(true), Some(false), Some(true), Some(true)];
        let runs: Vec<Run> = values
            .iter()
            .enumerate()
            .map(|(i, v)| run(i as u32 + 1, prioritized(*v), None))
            .collect();

        let field = record_stats(&scenario_truth(), &runs)
            .unwrap()
            .patient_prioritized;
        assert_eq!(field.match_count, 4);
        assert_eq!(field.total, 5);
        assert_eq!(field.match_rate, 0.8);
        assert_eq!(
            field.distribution,
            vec![
                ValueCount { value: Symbol::True, count: 4 },
                ValueCount { value: Symbol::False, count: 1 },
            ]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let agreement = FieldAgreement::tally(
            Symbol::Null,
            vec![Symbol::False, Symbol::True, Symbol::True, Symbol::False, Symbol::Null],
        )
        .unwrap();
        let order: Vec<&Symbol> = agreement.distribution.iter().map(|e| &e.value).collect();
        assert_eq!(order, vec![&Symbol::False, &Symbol::True, &Symbol::Null]);
    }

    #[test]
    fn null_truth_with_null_predictions_is_full_agreement() {
        let runs: Vec<Run> = (1..=3).map(|i| run(i, Labels::default(), None)).collect();
        let stats = record_stats(&scenario_truth(), &runs).unwrap();

        assert_eq!(stats.patient_ready.truth_value, Symbol::Null);
        assert_eq!(stats.patient_ready.match_rate, 1.0);
        assert_eq!(stats.availability.match_rate, 1.0);
        assert_eq!(stats.patient_short_notice.match_rate, 0.0);
    }

    #[test]
    fn single_run_is_a_valid_degenerate_distribution() {
        let runs = vec![run(1, prioritized(Some(false)), Some(50.0))];
        let stats = record_stats(&scenario_truth(), &runs).unwrap();

        assert_eq!(stats.patient_prioritized.match_rate, 0.0);
        assert_eq!(stats.patient_prioritized.distribution.len(), 1);
        assert_eq!(stats.patient_ready.match_rate, 1.0);
        assert!(stats.is_deterministic);
    }

    #[test]
    fn distribution_sums_to_total_and_matches_truth_bucket() {
        let labels = [
            prioritized(Some(true)),
            prioritized(None),
            prioritized(Some(false)),
            prioritized(Some(true)),
        ];
        let runs: Vec<Run> = labels
            .into_iter()
            .enumerate()
            .map(|(i, l)| run(i as u32 + 1, l, None))
            .collect();
        let stats = record_stats(&scenario_truth(), &runs).unwrap();

        for field in TrackedField::ALL {
            let agreement = stats.field(field);
            let sum: usize = agreement.distribution.iter().map(|e| e.count).sum();
            assert_eq!(sum, agreement.total);
            assert_eq!(agreement.total, runs.len());
            assert_eq!(agreement.match_count, agreement.count_of(&agreement.truth_value));
            assert!((0.0..=1.0).contains(&agreement.match_rate));
        }
    }

    #[test]
    fn availability_agreement_ignores_range_content() {
        let truth = Labels {
            availability_periods: periods(10),
            ..Labels::default()
        };
        let runs = vec![
            run(
                1,
                Labels {
                    availability_periods: periods(8),
                    ..Labels::default()
                },
                None,
            ),
            run(
                2,
                Labels {
                    availability_periods: periods(11),
                    ..Labels::default()
                },
                None,
            ),
        ];
        let stats = record_stats(&truth, &runs).unwrap();
        assert_eq!(stats.availability.truth_value, Symbol::List);
        assert_eq!(stats.availability.match_rate, 1.0);
        assert!(stats.is_deterministic);
    }

    #[test]
    fn unique_outcomes_counts_distinct_tuples() {
        let runs = vec![
            run(1, prioritized(Some(true)), None),
            run(2, prioritized(Some(true)), None),
            run(3, prioritized(Some(false)), None),
        ];
        let stats = record_stats(&scenario_truth(), &runs).unwrap();
        assert_eq!(stats.unique_outcomes, 2);
        assert!(!stats.is_deterministic);
    }

    #[test]
    fn record_latency_skips_missing_values() {
        let runs = vec![
            run(1, Labels::default(), Some(100.0)),
            run(2, Labels::default(), None),
            run(3, Labels::default(), Some(f64::NAN)),
            run(4, Labels::default(), Some(300.0)),
        ];
        let stats = record_stats(&scenario_truth(), &runs).unwrap();
        let latency = stats.latency.unwrap();
        assert_eq!(latency.count, 2);
        assert_eq!(latency.mean_ms, 200.0);
        assert_eq!(stats.total_runs, 4);
    }

    #[test]
    fn dataset_rollup_excludes_rows_without_runs() {
        let truth = scenario_truth();
        let perfect: Vec<Run> = (1..=2).map(|i| run(i, prioritized(Some(true)), None)).collect();
        let half = vec![
            run(1, prioritized(Some(true)), None),
            run(2, prioritized(Some(false)), None),
        ];
        let a = record_stats(&truth, &perfect);
        let b = record_stats(&truth, &half);

        let summary = summarize([a.as_ref(), None, b.as_ref()]);
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.rows_with_runs, 2);
        assert_eq!(summary.total_runs, 4);

        let rollup = summary.fields.field(TrackedField::PatientPrioritized);
        assert_eq!(rollup.rows_measured, 2);
        assert_eq!(rollup.average_match_rate, Some(0.75));
        assert_eq!(rollup.worst_match_rate, Some(0.5));
    }

    #[test]
    fn dataset_without_runs_has_no_rates() {
        let summary = summarize([None, None]);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.rows_with_runs, 0);
        let rollup = summary.fields.field(TrackedField::PatientReady);
        assert_eq!(rollup.average_match_rate, None);
        assert_eq!(rollup.worst_match_rate, None);
        assert!(summary.latency.is_none());
    }

    #[test]
    fn dataset_latency_pools_all_runs() {
        let truth = scenario_truth();
        let one = vec![run(1, Labels::default(), Some(1000.0))];
        let many: Vec<Run> = (1..=3).map(|i| run(i, Labels::default(), Some(100.0))).collect();
        let a = record_stats(&truth, &one);
        let b = record_stats(&truth, &many);

        let summary = summarize([a.as_ref(), b.as_ref()]);
        let latency = summary.latency.unwrap();
        assert_eq!(latency.count, 4);
        // Pooled mean (1300 / 4), not the mean of per-row means (550).
        assert_eq!(latency.mean_ms, 325.0);
        assert_eq!(latency.max_ms, 1000.0);
    }

    #[test]
    fn incremental_fold_matches_full_recompute() {
        let truth = scenario_truth();
        let first = vec![run(1, prioritized(Some(true)), Some(120.0))];
        let second = vec![
            run(1, prioritized(Some(false)), Some(80.0)),
            run(2, prioritized(None), Some(95.5)),
        ];
        let a = record_stats(&truth, &first);
        let b = record_stats(&truth, &second);

        let partial = SummaryFold::new().fold(a.as_ref());
        let incremental = partial.fold(b.as_ref()).finish();
        let full = summarize([a.as_ref(), b.as_ref()]);
        assert_eq!(incremental, full);
    }

    #[test]
    fn recompute_is_bit_identical() {
        let truth = scenario_truth();
        let runs: Vec<Run> = (1..=7)
            .map(|i| run(i, prioritized(Some(i % 3 == 0)), Some(10.0 / i as f64)))
            .collect();
        let stats = record_stats(&truth, &runs);

        let first = summarize([stats.as_ref(), None]);
        let second = summarize([stats.as_ref(), None]);
        let a = first.fields.patient_prioritized.average_match_rate.unwrap();
        let b = second.fields.patient_prioritized.average_match_rate.unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        let la = first.latency.as_ref().unwrap().mean_ms;
        let lb = second.latency.as_ref().unwrap().mean_ms;
        assert_eq!(la.to_bits(), lb.to_bits());
        assert_eq!(first, second);
    }
}
