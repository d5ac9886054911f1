mod cli;
mod display;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use commentbench_bench::{BenchConfig, BenchmarkRunner, CancelFlag, SummaryService};
use commentbench_client::{ClientConfig, HttpPredictionClient, resolve_cookie};
use commentbench_server::AppState;
use commentbench_store::{GroundTruthTable, RunStore};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, GlobalArgs};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    let global = &cli.global;
    info!("commentbench v{}", env!("CARGO_PKG_VERSION"));

    let truth = Arc::new(
        GroundTruthTable::load(&global.ground_truth)
            .with_context(|| format!("loading ground truth {}", global.ground_truth.display()))?,
    );
    let store = Arc::new(
        RunStore::open(&global.runs_dir)
            .with_context(|| format!("opening run store {}", global.runs_dir.display()))?,
    );
    let orphans = store.orphans(&truth);
    if !orphans.is_empty() {
        let ids = orphans.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ");
        warn!(count = orphans.len(), ids = %ids, "run journals for records missing from ground truth, ignoring them");
    }

    match cli.command {
        Commands::Serve(args) => {
            let runner = runner(global, truth, store)?;
            let listener = tokio::net::TcpListener::bind(&args.bind)
                .await
                .with_context(|| format!("binding {}", args.bind))?;
            commentbench_server::serve(listener, AppState::new(runner), shutdown_signal()).await?;
            info!("server stopped");
        }
        Commands::RunAll(args) => {
            let runner = runner(global, truth, store)?;
            let cancel = CancelFlag::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    shutdown_signal().await;
                    warn!("interrupt received, finishing in-flight records");
                    cancel.cancel();
                }
            });
            let report = runner.run_all(args.count, args.limit, &cancel).await?;
            emit(global.json, &report, display::run_all)?;
        }
        Commands::RunRow(args) => {
            let runner = runner(global, truth, store)?;
            let report = runner
                .run_record(&args.id, args.batch.count, args.batch.limit)
                .await?;
            emit(global.json, &report, display::batch)?;
        }
        Commands::Summary(args) => {
            let summary = SummaryService::new(truth, store).determinism_summary(args.limit);
            emit(global.json, &summary, display::determinism_summary)?;
        }
        Commands::Detail(args) => {
            let detail = SummaryService::new(truth, store).determinism_detail(&args.id, args.limit)?;
            emit(global.json, &detail, display::detail)?;
        }
        Commands::Results => {
            let results = SummaryService::new(truth, store).results();
            emit(global.json, &results, display::results)?;
        }
    }
    Ok(())
}

fn runner(
    global: &GlobalArgs,
    truth: Arc<GroundTruthTable>,
    store: Arc<RunStore>,
) -> Result<BenchmarkRunner> {
    let Some(endpoint) = &global.endpoint else {
        bail!("no analysis endpoint: pass --endpoint or set COMMENTBENCH_ENDPOINT");
    };
    let cookie = resolve_cookie(global.cookie.as_deref(), Some(&global.cookie_file))
        .with_context(|| format!("reading {}", global.cookie_file.display()))?;
    if cookie.is_none() {
        warn!("no cookie configured, requests are sent unauthenticated");
    }
    let client = HttpPredictionClient::new(&ClientConfig {
        endpoint: endpoint.clone(),
        cookie,
        timeout: Duration::from_secs(global.timeout_secs),
        verify_tls: global.verify_tls,
    })?;
    let config = BenchConfig {
        concurrency: global.concurrency,
        max_batch_count: global.max_batch_count,
    };
    Ok(BenchmarkRunner::new(truth, store, Arc::new(client), config))
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    render: fn(&T) -> Result<String, std::fmt::Error>,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value).context("rendering report")?);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
