use std::future::Future;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use commentbench_bench::{
    BatchReport, BenchError, DeterminismDetail, InvocationFailure, ResultRow, ResultsView, RunAllReport,
};
use commentbench_core::{AccuracySummary, DeterminismSummary, FailureRow, GroundTruthRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ApiError, AppState};

const DEFAULT_FAILURE_LIMIT: usize = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/results", get(results))
        .route("/summary", get(summary))
        .route("/failures", get(failures))
        .route("/ground-truth", get(ground_truth))
        .route("/run-benchmark", post(run_benchmark))
        .route("/run-row/{id}", post(run_row))
        .route("/run-row/{id}/batch", post(run_row_batch))
        .route("/determinism-summary", get(determinism_summary))
        .route("/determinism/{id}", get(determinism_detail))
        .route("/run-determinism-all", post(run_determinism_all))
        .route("/run-determinism-all/cancel", post(cancel_determinism_all))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct BatchParams {
    count: Option<usize>,
    limit: Option<usize>,
}

impl BatchParams {
    fn count(&self) -> usize {
        self.count.unwrap_or(1)
    }
}

#[derive(Debug, Default, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct Rows<T> {
    rows: T,
}

#[derive(Serialize)]
struct SummaryBody {
    summary: AccuracySummary,
}

#[derive(Serialize)]
struct BenchmarkBody {
    requested: usize,
    succeeded: usize,
    summary: AccuracySummary,
    determinism: DeterminismSummary,
}

#[derive(Serialize)]
struct RunRowBody {
    row: ResultRow,
    summary: AccuracySummary,
    requested: usize,
    succeeded: usize,
    failures: Vec<InvocationFailure>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn results(State(state): State<AppState>) -> Json<ResultsView> {
    Json(state.summary.results())
}

async fn summary(State(state): State<AppState>) -> Json<SummaryBody> {
    Json(SummaryBody {
        summary: state.summary.accuracy(),
    })
}

async fn failures(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Rows<Vec<FailureRow>>> {
    let limit = params.limit.unwrap_or(DEFAULT_FAILURE_LIMIT);
    Json(Rows {
        rows: state.summary.failures(limit),
    })
}

async fn ground_truth(State(state): State<AppState>) -> Json<Rows<Vec<GroundTruthRecord>>> {
    Json(Rows {
        rows: state.summary.ground_truth().to_vec(),
    })
}

/// Drive `work` on its own task. A caller that disconnects drops only the
/// wait, never the work, so batches end at a record boundary or not at all.
async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, BenchError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError(BenchError::Task(e.to_string())))?
        .map_err(ApiError)
}

/// One pass over every record.
async fn run_benchmark(State(state): State<AppState>) -> Result<Json<BenchmarkBody>, ApiError> {
    let run = state.start_run();
    let runner = state.runner.clone();
    let report = detached(async move { runner.run_all(1, None, &run.flag).await }).await?;
    Ok(Json(BenchmarkBody {
        requested: report.requested,
        succeeded: report.succeeded,
        summary: state.summary.accuracy(),
        determinism: report.summary,
    }))
}

async fn run_row(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunRowBody>, ApiError> {
    let runner = state.runner.clone();
    let record = id.clone();
    let report = detached(async move { runner.run_record(&record, 1, None).await }).await?;
    Ok(Json(RunRowBody {
        row: state.summary.row(&id)?,
        summary: state.summary.accuracy(),
        requested: report.requested,
        succeeded: report.succeeded,
        failures: report.failures,
    }))
}

async fn run_row_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<BatchParams>,
) -> Result<Json<BatchReport>, ApiError> {
    let runner = state.runner.clone();
    let report = detached(async move {
        runner
            .run_record(&id, params.count(), params.limit)
            .await
    })
    .await?;
    Ok(Json(report))
}

async fn determinism_summary(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<DeterminismSummary> {
    Json(state.summary.determinism_summary(params.limit))
}

async fn determinism_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DeterminismDetail>, ApiError> {
    Ok(Json(state.summary.determinism_detail(&id, params.limit)?))
}

async fn run_determinism_all(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
) -> Result<Json<RunAllReport>, ApiError> {
    let run = state.start_run();
    let runner = state.runner.clone();
    let report = detached(async move {
        runner
            .run_all(params.count(), params.limit, &run.flag)
            .await
    })
    .await?;
    Ok(Json(report))
}

async fn cancel_determinism_all(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "cancelled": state.cancel_runs() }))
}
