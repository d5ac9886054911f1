use commentbench_core::RecordId;
use commentbench_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),
    #[error("count must be between 1 and {max}, got {count}")]
    InvalidCount { count: usize, max: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("record task failed: {0}")]
    Task(String),
}
