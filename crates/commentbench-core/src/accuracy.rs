//! Accuracy of the latest prediction per record against ground truth.

use serde::Serialize;

use crate::model::{GroundTruthRecord, Prediction, RecordId, TrackedField};
use crate::normalize::Symbol;

const CONFUSION_LABELS: [Symbol; 3] = [Symbol::True, Symbol::False, Symbol::Null];

/// Accuracy of one field over the scored rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAccuracy {
    pub field: &'static str,
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
}

/// Truth × prediction counts for a boolean field over `true`/`false`/`null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub field: &'static str,
    pub labels: [Symbol; 3],
    /// `counts[truth][predicted]`, indexed like `labels`.
    pub counts: [[usize; 3]; 3],
    /// Pairs where either side fell outside `labels`.
    pub unlabelled: usize,
}

impl ConfusionMatrix {
    fn new(field: TrackedField) -> Self {
        Self {
            field: field.as_str(),
            labels: CONFUSION_LABELS,
            counts: [[0; 3]; 3],
            unlabelled: 0,
        }
    }

    fn record(&mut self, truth: &Symbol, predicted: &Symbol) {
        let position = |s: &Symbol| CONFUSION_LABELS.iter().position(|l| l == s);
        match (position(truth), position(predicted)) {
            (Some(t), Some(p)) => self.counts[t][p] += 1,
            _ => self.unlabelled += 1,
        }
    }
}

/// Dataset accuracy summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub metrics: Vec<FieldAccuracy>,
    /// Rows where at least one field disagrees with truth.
    pub failure_count: usize,
    pub total: usize,
    pub confusion: Vec<ConfusionMatrix>,
}

/// One field of a failed row, truth beside prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: &'static str,
    pub truth: Symbol,
    pub predicted: Symbol,
    pub matches: bool,
}

/// A row whose prediction disagrees with truth on at least one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRow {
    pub id: RecordId,
    pub comment_text: String,
    pub fields: Vec<FieldComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn compare(record: &GroundTruthRecord, prediction: &Prediction) -> Vec<FieldComparison> {
    TrackedField::ALL
        .iter()
        .map(|&field| {
            let truth = record.truth.symbol(field);
            let predicted = prediction.labels.symbol(field);
            FieldComparison {
                field: field.as_str(),
                matches: truth == predicted,
                truth,
                predicted,
            }
        })
        .collect()
}

/// Score each `(record, latest prediction)` pair.
pub fn accuracy_summary<'a, I>(rows: I) -> AccuracySummary
where
    I: IntoIterator<Item = (&'a GroundTruthRecord, &'a Prediction)>,
{
    let mut correct = [0usize; 4];
    let mut confusion: Vec<ConfusionMatrix> = TrackedField::ALL
        .iter()
        .filter(|f| f.is_boolean())
        .map(|&f| ConfusionMatrix::new(f))
        .collect();
    let mut total = 0;
    let mut failure_count = 0;

    for (record, prediction) in rows {
        total += 1;
        let comparisons = compare(record, prediction);
        let mut all_match = true;
        for (field, cmp) in TrackedField::ALL.iter().zip(&comparisons) {
            if cmp.matches {
                correct[field.index()] += 1;
            } else {
                all_match = false;
            }
            if field.is_boolean() {
                confusion[field.index()].record(&cmp.truth, &cmp.predicted);
            }
        }
        if !all_match {
            failure_count += 1;
        }
    }

    let metrics = TrackedField::ALL
        .iter()
        .map(|field| {
            let correct = correct[field.index()];
            FieldAccuracy {
                field: field.as_str(),
                accuracy: if total > 0 {
                    correct as f64 / total as f64
                } else {
                    0.0
                },
                correct,
                total,
            }
        })
        .collect();

    AccuracySummary {
        metrics,
        failure_count,
        total,
        confusion,
    }
}

/// Rows whose prediction misses truth on any field, in input order.
pub fn failure_rows<'a, I>(rows: I) -> Vec<FailureRow>
where
    I: IntoIterator<Item = (&'a GroundTruthRecord, &'a Prediction)>,
{
    rows.into_iter()
        .filter_map(|(record, prediction)| {
            let fields = compare(record, prediction);
            if fields.iter().all(|f| f.matches) {
                return None;
            }
            Some(FailureRow {
                id: record.id.clone(),
                comment_text: record.comment_text.clone(),
                fields,
                reasoning: prediction.reasoning.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldValue, Labels};

    fn record(id: &str, prioritized: Option<bool>, ready: Option<bool>) -> GroundTruthRecord {
        GroundTruthRecord {
            id: id.into(),
            comment_text: format!("comment {id}"),
            truth: Labels {
                patient_prioritized: prioritized.into(),
                patient_ready: ready.into(),
                ..Labels::default()
            },
        }
    }

    fn prediction(prioritized: Option<bool>, ready: Option<bool>) -> Prediction {
        Prediction {
            labels: Labels {
                patient_prioritized: prioritized.into(),
                patient_ready: ready.into(),
                ..Labels::default()
            },
            reasoning: Some("because".into()),
        }
    }

    #[test]
    fn empty_input_scores_zero_rows() {
        let summary = accuracy_summary(Vec::<(&GroundTruthRecord, &Prediction)>::new());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.failure_count, 0);
        assert!(summary.metrics.iter().all(|m| m.accuracy == 0.0));
    }

    #[test]
    fn per_field_accuracy_and_failures() {
        let records = [
            record("1", Some(true), None),
            record("2", Some(false), Some(true)),
        ];
        let predictions = [
            prediction(Some(true), None),
            prediction(Some(true), Some(true)),
        ];
        let summary = accuracy_summary(records.iter().zip(predictions.iter()));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failure_count, 1);
        let prioritized = &summary.metrics[0];
        assert_eq!(prioritized.field, "patient_prioritized");
        assert_eq!(prioritized.correct, 1);
        assert_eq!(prioritized.accuracy, 0.5);
        let ready = &summary.metrics[1];
        assert_eq!(ready.correct, 2);
        assert_eq!(summary.metrics[3].field, "availability");
        assert_eq!(summary.metrics[3].correct, 2);
    }

    #[test]
    fn confusion_counts_truth_by_prediction() {
        let records = [
            record("1", Some(false), None),
            record("2", Some(false), None),
            record("3", None, None),
        ];
        let predictions = [
            prediction(Some(true), None),
            prediction(Some(false), None),
            prediction(Some(true), None),
        ];
        let summary = accuracy_summary(records.iter().zip(predictions.iter()));
        let matrix = &summary.confusion[0];
        assert_eq!(matrix.field, "patient_prioritized");
        // rows: truth, cols: predicted; order true/false/null
        assert_eq!(matrix.counts[1][0], 1);
        assert_eq!(matrix.counts[1][1], 1);
        assert_eq!(matrix.counts[2][0], 1);
        assert_eq!(matrix.unlabelled, 0);
        assert_eq!(summary.confusion.len(), 3);
    }

    #[test]
    fn unexpected_values_land_outside_the_matrix() {
        let records = [record("1", Some(true), None)];
        let mut odd = prediction(None, None);
        odd.labels.patient_prioritized = FieldValue::Text("maybe".into());
        let summary = accuracy_summary(records.iter().zip(std::iter::once(&odd)));
        assert_eq!(summary.confusion[0].unlabelled, 1);
        assert_eq!(summary.metrics[0].correct, 0);
    }

    #[test]
    fn failure_rows_list_every_field() {
        let records = [record("1", Some(true), None), record("2", None, None)];
        let predictions = [prediction(Some(true), None), prediction(Some(false), None)];
        let failures = failure_rows(records.iter().zip(predictions.iter()));

        assert_eq!(failures.len(), 1);
        let row = &failures[0];
        assert_eq!(row.id.as_str(), "2");
        assert_eq!(row.fields.len(), 4);
        assert!(!row.fields[0].matches);
        assert_eq!(row.fields[0].predicted, Symbol::False);
        assert_eq!(row.reasoning.as_deref(), Some("because"));
    }
}
