//! HTTP API over the benchmark runner and summary views.

mod error;
mod routes;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use commentbench_bench::{BenchmarkRunner, CancelFlag, SummaryService};
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use routes::router;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    runner: BenchmarkRunner,
    summary: SummaryService,
    active_runs: Arc<Mutex<Vec<CancelFlag>>>,
}

impl AppState {
    pub fn new(runner: BenchmarkRunner) -> Self {
        Self {
            summary: runner.summary(),
            runner,
            active_runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a run-all so the cancel endpoint can reach it. The
    /// registration ends when the returned guard drops.
    fn start_run(&self) -> ActiveRun {
        let flag = CancelFlag::new();
        self.active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(flag.clone());
        ActiveRun {
            flag,
            registry: self.active_runs.clone(),
        }
    }

    /// Trip every in-progress run-all. Returns whether any was running.
    fn cancel_runs(&self) -> bool {
        let runs = self
            .active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for flag in runs.iter() {
            flag.cancel();
        }
        !runs.is_empty()
    }
}

struct ActiveRun {
    flag: CancelFlag,
    registry: Arc<Mutex<Vec<CancelFlag>>>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|f| !f.same_run(&self.flag));
    }
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
