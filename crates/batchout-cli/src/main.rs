use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runs a batchout config document to completion, once or forever.
#[derive(Debug, Parser)]
#[command(name = "batchout", about = "Declarative batch data pipeline runner")]
struct Args {
    /// Path to the YAML config document.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Number of runs to execute before exiting; -1 runs forever.
    #[arg(short = 'n', long = "num-batches", default_value_t = -1)]
    num_batches: i64,

    /// Minimum seconds to sleep between runs.
    #[arg(short = 'w', long = "min-wait-sec", default_value_t = 0.0)]
    min_wait_sec: f64,

    /// Maximum additional jittered seconds to sleep between runs.
    #[arg(short = 'W', long = "max-wait-sec", default_value_t = 0.0)]
    max_wait_sec: f64,

    /// Log level passed to `tracing-subscriber`'s `EnvFilter` (e.g. `info`, `batchout=debug`).
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_document(path: &std::path::Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_yaml::from_str(&text)?;
    Ok(value)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);
    tracing::debug!(?args, "parsed command line arguments");

    let document = load_document(&args.config)?;
    let empty = serde_json::Value::Object(serde_json::Map::new());
    let defaults = document.get("defaults").unwrap_or(&empty);
    let mut batch = batchout_core::Batch::from_config(&document, defaults)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        batch
            .run_forever(args.num_batches, Duration::from_secs_f64(args.min_wait_sec), Duration::from_secs_f64(args.max_wait_sec))
            .await
    })
}
