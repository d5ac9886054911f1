//! Benchmark orchestration: drive the prediction client against ground-truth
//! records, persist every run, and serve the aggregated views.

mod config;
mod error;
pub mod orchestrator;
pub mod summary;

pub use config::{BenchConfig, CancelFlag};
pub use error::BenchError;
pub use orchestrator::{BatchReport, BenchmarkRunner, InvocationFailure, RunAllReport};
pub use summary::{DeterminismDetail, ResultRow, ResultsView, SummaryService};

#[cfg(test)]
pub(crate) mod testing;
