//! Read-only views over ground truth and the run store.
//!
//! Nothing here is cached: every view is recomputed from the store's current
//! snapshot, so reads during an in-flight batch see the runs persisted so far.

use std::sync::Arc;

use commentbench_core::{
    AccuracySummary, DeterminismSummary, FailureRow, GroundTruthRecord, Labels, Prediction,
    RecordId, RecordStats, Run, SummaryFold, accuracy_summary, failure_rows, record_stats,
};
use commentbench_store::{GroundTruthTable, RunStore};
use serde::Serialize;

use crate::BenchError;

/// One ground-truth record beside its latest prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub id: RecordId,
    pub comment_text: String,
    pub truth: Labels,
    pub prediction: Option<Prediction>,
    pub latency_ms: Option<f64>,
    pub attempt: Option<u32>,
    pub total_runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub rows: Vec<ResultRow>,
    pub summary: AccuracySummary,
}

/// Stored runs for one record plus their aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterminismDetail {
    pub record_id: RecordId,
    pub runs: Vec<Run>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RecordStats>,
    pub total_runs: usize,
}

#[derive(Clone)]
pub struct SummaryService {
    truth: Arc<GroundTruthTable>,
    store: Arc<RunStore>,
}

impl SummaryService {
    pub fn new(truth: Arc<GroundTruthTable>, store: Arc<RunStore>) -> Self {
        Self { truth, store }
    }

    fn record(&self, id: &str) -> Result<&GroundTruthRecord, BenchError> {
        self.truth
            .get(id)
            .ok_or_else(|| BenchError::UnknownRecord(RecordId::new(id)))
    }

    fn result_row(&self, record: &GroundTruthRecord) -> ResultRow {
        let latest = self.store.latest_run(&record.id);
        ResultRow {
            id: record.id.clone(),
            comment_text: record.comment_text.clone(),
            truth: record.truth.clone(),
            latency_ms: latest.as_ref().and_then(|r| r.latency_ms),
            attempt: latest.as_ref().map(|r| r.attempt),
            prediction: latest.map(|r| r.prediction),
            total_runs: self.store.run_count(&record.id),
        }
    }

    /// Latest run of every record that has one, in ground-truth order.
    fn latest(&self) -> Vec<(&GroundTruthRecord, Run)> {
        self.truth
            .iter()
            .filter_map(|record| self.store.latest_run(&record.id).map(|run| (record, run)))
            .collect()
    }

    /// Every record with its latest prediction, plus accuracy over those.
    pub fn results(&self) -> ResultsView {
        let rows: Vec<ResultRow> = self.truth.iter().map(|r| self.result_row(r)).collect();
        ResultsView {
            rows,
            summary: self.accuracy(),
        }
    }

    pub fn row(&self, id: &str) -> Result<ResultRow, BenchError> {
        let record = self.record(id)?;
        Ok(self.result_row(record))
    }

    /// Accuracy of the latest prediction per record. Records without runs are
    /// not scored.
    pub fn accuracy(&self) -> AccuracySummary {
        let latest = self.latest();
        accuracy_summary(latest.iter().map(|(record, run)| (*record, &run.prediction)))
    }

    /// Records whose latest prediction misses truth, at most `limit` of them.
    pub fn failures(&self, limit: usize) -> Vec<FailureRow> {
        let latest = self.latest();
        let mut rows = failure_rows(latest.iter().map(|(record, run)| (*record, &run.prediction)));
        rows.truncate(limit);
        rows
    }

    /// Dataset summary. With `limit`, each record contributes only its most
    /// recent `limit` runs.
    pub fn determinism_summary(&self, limit: Option<usize>) -> DeterminismSummary {
        self.truth
            .iter()
            .fold(SummaryFold::new(), |fold, record| {
                let (runs, _) = self.store.recent_runs(&record.id, limit);
                fold.fold(record_stats(&record.truth, &runs).as_ref())
            })
            .finish()
    }

    pub fn determinism_detail(
        &self,
        id: &str,
        limit: Option<usize>,
    ) -> Result<DeterminismDetail, BenchError> {
        let record = self.record(id)?;
        let (runs, total_runs) = self.store.recent_runs(&record.id, limit);
        Ok(DeterminismDetail {
            record_id: record.id.clone(),
            stats: record_stats(&record.truth, &runs),
            runs,
            total_runs,
        })
    }

    pub fn ground_truth(&self) -> &[GroundTruthRecord] {
        self.truth.records()
    }
}
