use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use walmart_liquidations::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli::run(&cli) {
        Ok(summary) if summary.items == 0 && cli.fail_on_empty => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so `--demo` without `--output` can pipe clean JSON.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
