mod audit;
mod binding;
mod config;
mod deep;
mod error;
mod exec;
mod integrity;
mod presence;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use crate::audit::{AuditOutcome, Auditor, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "kontrol-audit",
    version,
    about = "Pre-flight audit of the Kontrol hosting substrate",
    long_about = None
)]
struct Cli {
    /// `--major` runs the deep audit (build + cloud auth); anything else is a light audit
    #[arg(value_name = "MODE", allow_hyphen_values = true)]
    mode: Option<String>,

    /// Anything after MODE is accepted and ignored
    #[arg(
        value_name = "IGNORED",
        hide = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    ignored: Vec<String>,

    /// Audit configuration file (defaults to <root>/.kontrol-audit.toml when present)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory the audited paths are relative to
    #[arg(long = "root", value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Raise diagnostic logging on stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("kontrol-audit: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // A timed-out git query may still hold a blocking thread; don't wait on it.
    runtime.shutdown_background();

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("kontrol-audit: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<AuditOutcome> {
    let mode = Mode::from_arg(cli.mode.as_deref());
    if !cli.ignored.is_empty() {
        tracing::debug!(ignored=?cli.ignored, "cli: extra arguments ignored");
    }
    let cfg = config::load_config(&cli.root, cli.config.as_deref())
        .await
        .context("failed to load audit configuration")?;
    tracing::debug!(?mode, root=%cli.root.display(), "audit: start");

    let stdout = std::io::stdout();
    let mut auditor = Auditor::new(&cfg, &cli.root, stdout.lock());
    let outcome = auditor.run(mode).await.context("failed to write audit report")?;
    match &outcome {
        AuditOutcome::Passed { mode } => tracing::info!(?mode, "audit: passed"),
        AuditOutcome::Failed { after, failure } => tracing::info!(
            ?after,
            subject = ?failure.subject(),
            "audit: failed: {}",
            failure
        ),
    }
    Ok(outcome)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("KONTROL_AUDIT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
