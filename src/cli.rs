use crate::{
    config::Config,
    pipeline::Pipeline,
    report::{render_text, ReportRecord},
    rpc::{self, ChainClient, HttpRpcClient},
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Exit code for runs that could not produce a verdict. Distinct from both verdict codes.
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "gas-health", version)]
#[command(about = "Analyze recent EVM blocks for gas utilization stability and base fee consistency")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./gas-health.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// JSON-RPC endpoint. Takes precedence over RPC_URL and the config file.
    #[arg(long, global = true)]
    pub rpc: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check endpoint connectivity.
    Doctor {},
    /// Fetch the most recent blocks and print the samples.
    Sample {
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,
    },
    /// Sample, evaluate and exit 0 (stable), 2 (unstable) or 1 (failure).
    Check {
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        /// Include per-block rows in JSON output.
        #[arg(long)]
        blocks: bool,
    },
}

/// Exit code for an argument parsing outcome. clap's own code for usage errors is 2, which
/// would read as an unstable verdict.
pub fn exit_code_for(err: &clap::Error) -> i32 {
    if err.use_stderr() { FATAL_EXIT_CODE } else { 0 }
}

/// Runs one command and returns the process exit code.
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg = resolve_config(&args)?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    let client = HttpRpcClient::new(&cfg.rpc.url, cfg.request_timeout()?)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&client),
        Command::Sample { count } => sample(&cfg, &client, count.unwrap_or(cfg.sampling.block_count)),
        Command::Check {
            count,
            json,
            blocks,
        } => check(
            &cfg,
            &client,
            count.unwrap_or(cfg.sampling.block_count),
            *json || cfg.output.json,
            *blocks || cfg.output.include_blocks,
        ),
    }
}

/// File (or defaults), then `RPC_URL`, then CLI flags.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let mut cfg = cfg.with_env_overrides();
    if let Some(url) = &args.rpc {
        cfg.rpc.url = url.clone();
    }
    if let Some(secs) = args.timeout {
        cfg.rpc.timeout_seconds = secs;
    }
    Ok(cfg)
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("gas-health.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for the report.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    // A subscriber set earlier in the process (repeated dispatch) keeps logging working.
    if let Err(e) = installed {
        if !tracing::dispatcher::has_been_set() {
            return Err(anyhow!("failed to init logging: {e}"));
        }
    }

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("gas-health.log"))
}

fn doctor(client: &HttpRpcClient) -> Result<i32> {
    let diag = rpc::doctor(client);
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if diag.ok {
        Ok(0)
    } else {
        warn!("endpoint check failed: {}", client.endpoint());
        Ok(FATAL_EXIT_CODE)
    }
}

fn sample(cfg: &Config, client: &HttpRpcClient, count: i64) -> Result<i32> {
    info!("rpc={} count={count}", client.endpoint());
    let set = Pipeline::new(cfg, client).sample(count)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "head": set.head(),
            "requested": set.requested(),
            "skipped": set.skipped(),
            "samples": set.samples(),
        }))?
    );
    Ok(0)
}

fn check(cfg: &Config, client: &HttpRpcClient, count: i64, json: bool, blocks: bool) -> Result<i32> {
    info!("rpc={} count={count}", client.endpoint());
    let out = Pipeline::new(cfg, client).run(count)?;
    let record = ReportRecord::new(&out.report, blocks.then_some(&out.samples));

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!(
            "{}",
            render_text(&record, client.endpoint(), cfg.output.utilization_bar)
        );
    }

    Ok(out.report.verdict.exit_code())
}
