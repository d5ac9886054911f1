//! Benchmark orchestration.
//!
//! A record batch invokes the client `count` times in sequence while holding
//! the record's writer, so attempt numbers are assigned in invocation order.
//! Run-all fans record batches out over a bounded number of tasks; the client
//! only ever sees `concurrency` calls at once.

use std::sync::Arc;

use commentbench_client::{FailureKind, PredictionClient};
use commentbench_core::{DeterminismSummary, GroundTruthRecord, RecordId, RecordStats, Run, record_stats};
use commentbench_store::{GroundTruthTable, NewRun, RunStore};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::summary::SummaryService;
use crate::{BenchConfig, BenchError, CancelFlag};

/// One invocation that produced no run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationFailure {
    /// 1-based position within the batch.
    pub invocation: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of a batch against one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub record_id: RecordId,
    pub requested: usize,
    pub succeeded: usize,
    pub failures: Vec<InvocationFailure>,
    /// Most recent runs, capped at the requested limit.
    pub runs: Vec<Run>,
    /// Aggregated over `runs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RecordStats>,
    /// Every run ever persisted for the record.
    pub total_runs: usize,
}

/// Outcome of a batch over every record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunAllReport {
    pub rows_requested: usize,
    pub rows_completed: usize,
    pub cancelled: bool,
    pub requested: usize,
    pub succeeded: usize,
    pub summary: DeterminismSummary,
}

#[derive(Clone)]
pub struct BenchmarkRunner {
    truth: Arc<GroundTruthTable>,
    store: Arc<RunStore>,
    client: Arc<dyn PredictionClient>,
    config: BenchConfig,
}

impl BenchmarkRunner {
    pub fn new(
        truth: Arc<GroundTruthTable>,
        store: Arc<RunStore>,
        client: Arc<dyn PredictionClient>,
        config: BenchConfig,
    ) -> Self {
        Self {
            truth,
            store,
            client,
            config,
        }
    }

    pub fn summary(&self) -> SummaryService {
        SummaryService::new(self.truth.clone(), self.store.clone())
    }

    fn record(&self, id: &str) -> Result<&GroundTruthRecord, BenchError> {
        self.truth
            .get(id)
            .ok_or_else(|| BenchError::UnknownRecord(RecordId::new(id)))
    }

    /// Invoke the client `count` times for one record and persist each
    /// successful outcome as the record's next attempt.
    ///
    /// Failed invocations are reported and skipped; they never take an attempt
    /// number. A storage failure aborts the batch.
    pub async fn run_record(
        &self,
        id: &str,
        count: usize,
        limit: Option<usize>,
    ) -> Result<BatchReport, BenchError> {
        self.config.check_count(count)?;
        let record = self.record(id)?;

        let mut writer = self.store.writer(&record.id).await;
        info!(record_id = %record.id, count, first_attempt = writer.next_attempt(), "batch started");

        let mut succeeded = 0;
        let mut failures = Vec::new();
        for invocation in 1..=count {
            match self.client.analyze(&record.comment_text).await {
                Ok(analysis) => {
                    writer
                        .append(NewRun {
                            prediction: analysis.prediction,
                            latency_ms: analysis.latency_ms,
                            start_time: analysis.start_time,
                            end_time: analysis.end_time,
                            status_code: analysis.status_code,
                        })
                        .await?;
                    succeeded += 1;
                }
                Err(e) => {
                    let kind = e.kind();
                    warn!(
                        record_id = %record.id,
                        invocation,
                        kind = kind.as_str(),
                        error = %e,
                        "invocation failed"
                    );
                    failures.push(InvocationFailure {
                        invocation,
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }
        drop(writer);

        let (runs, total_runs) = self.store.recent_runs(&record.id, limit);
        info!(
            record_id = %record.id,
            requested = count,
            succeeded,
            failed = failures.len(),
            total_runs,
            "batch finished"
        );
        Ok(BatchReport {
            record_id: record.id.clone(),
            requested: count,
            succeeded,
            failures,
            stats: record_stats(&record.truth, &runs),
            runs,
            total_runs,
        })
    }

    /// Run a batch for every record, at most `concurrency` at a time.
    ///
    /// `cancel` is checked before each record batch starts; batches already
    /// running finish. A storage failure stops scheduling new batches and is
    /// returned once in-flight batches drain.
    pub async fn run_all(
        &self,
        count: usize,
        limit: Option<usize>,
        cancel: &CancelFlag,
    ) -> Result<RunAllReport, BenchError> {
        self.config.check_count(count)?;
        let rows_requested = self.truth.len();
        info!(rows = rows_requested, count, concurrency = self.config.concurrency, "run-all started");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let abort = CancelFlag::new();
        let mut tasks = JoinSet::new();
        for record in self.truth.iter() {
            let runner = self.clone();
            let id = record.id.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let abort = abort.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if cancel.is_cancelled() || abort.is_cancelled() {
                    return None;
                }
                Some(runner.run_record(id.as_str(), count, limit).await)
            });
        }

        let mut rows_completed = 0;
        let mut requested = 0;
        let mut succeeded = 0;
        let mut failure: Option<BenchError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Some(Err(BenchError::Task(e.to_string()))),
            };
            match outcome {
                Some(Ok(report)) => {
                    rows_completed += 1;
                    requested += report.requested;
                    succeeded += report.succeeded;
                }
                Some(Err(e)) => {
                    error!(error = %e, "record batch aborted");
                    abort.cancel();
                    failure.get_or_insert(e);
                }
                None => {}
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let cancelled = cancel.is_cancelled() && rows_completed < rows_requested;
        let summary = self.summary().determinism_summary(limit);
        info!(rows_completed, requested, succeeded, cancelled, "run-all finished");
        Ok(RunAllReport {
            rows_requested,
            rows_completed,
            cancelled,
            requested,
            succeeded,
            summary,
        })
    }
}
