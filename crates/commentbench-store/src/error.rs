use std::path::PathBuf;

use commentbench_core::RecordId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ground truth file not found: {0}")]
    GroundTruthNotFound(PathBuf),

    #[error("unsupported ground truth format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("CSV import needs the `duckdb` feature: {0}")]
    CsvImportDisabled(PathBuf),

    #[error("duplicate record id in ground truth: {0}")]
    DuplicateRecord(RecordId),

    #[error("record {id}: invalid {column}: {message}")]
    InvalidCell {
        id: String,
        column: &'static str,
        message: String,
    },

    #[error("corrupt run journal {path} at line {line}: {source}")]
    CorruptJournal {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("run journal {path}: expected attempt {expected}, found {found}")]
    AttemptOutOfSequence {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("run journal {path} mixes records {first} and {other}")]
    MixedJournal {
        path: PathBuf,
        first: RecordId,
        other: RecordId,
    },

    #[error("run journal {path} holds record {record_id}, expected file name {expected}")]
    MisnamedJournal {
        path: PathBuf,
        record_id: RecordId,
        expected: String,
    },

    #[error("run journal {path} repeats record {record_id}")]
    DuplicateJournal { path: PathBuf, record_id: RecordId },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),
}
