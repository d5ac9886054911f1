//! Storage layer: the ground-truth table and the per-record run journal.

mod error;
pub use error::StoreError;

pub mod runs;
pub mod truth;

pub use runs::{NewRun, RecordWriter, RunStore};
pub use truth::GroundTruthTable;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckTruthStore;
