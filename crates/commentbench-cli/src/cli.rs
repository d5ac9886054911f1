use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "commentbench",
    version,
    about = "Determinism benchmark for the comment-analysis endpoint"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Ground-truth file (.csv or .json).
    #[arg(long, env = "COMMENTBENCH_GROUND_TRUTH", default_value = "data/ground_truth.csv", global = true)]
    pub ground_truth: PathBuf,

    /// Directory holding one run journal per record.
    #[arg(long, env = "COMMENTBENCH_RUNS_DIR", default_value = "data/determinism_runs", global = true)]
    pub runs_dir: PathBuf,

    /// Analysis endpoint URL.
    #[arg(long, env = "COMMENTBENCH_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Cookie header value.
    #[arg(long, env = "AUTH_COOKIE", hide_env_values = true, global = true)]
    pub cookie: Option<String>,

    /// File containing the cookie header value, read when --cookie is unset.
    #[arg(long, default_value = "auth_token.txt", global = true)]
    pub cookie_file: PathBuf,

    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    #[arg(long, env = "COMMENTBENCH_VERIFY_TLS", default_value_t = false, global = true)]
    pub verify_tls: bool,

    /// Record batches in flight at once during run-all.
    #[arg(long, default_value_t = 4, global = true)]
    pub concurrency: usize,

    /// Largest accepted --count.
    #[arg(long, default_value_t = 100, global = true)]
    pub max_batch_count: usize,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Run a batch against every record.
    RunAll(BatchArgs),
    /// Run a batch against one record.
    RunRow(RunRowArgs),
    /// Dataset determinism summary.
    Summary(LimitArgs),
    /// Stored runs and agreement for one record.
    Detail(DetailArgs),
    /// Latest prediction per record with accuracy.
    Results,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub bind: String,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Only report the most recent N runs per record.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct RunRowArgs {
    pub id: String,

    #[command(flatten)]
    pub batch: BatchArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LimitArgs {
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct DetailArgs {
    pub id: String,

    #[arg(long)]
    pub limit: Option<usize>,
}
