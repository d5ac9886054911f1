use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::BenchError;

/// Limits for benchmark runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Record batches allowed in flight at once during a run-all.
    pub concurrency: usize,
    /// Upper bound on invocations per record per request.
    pub max_batch_count: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_batch_count: 100,
        }
    }
}

impl BenchConfig {
    pub fn check_count(&self, count: usize) -> Result<(), BenchError> {
        if count == 0 || count > self.max_batch_count {
            return Err(BenchError::InvalidCount {
                count,
                max: self.max_batch_count,
            });
        }
        Ok(())
    }
}

/// Shared stop request for a run-all. Checked between record batches only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Whether both handles control the same run.
    pub fn same_run(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
