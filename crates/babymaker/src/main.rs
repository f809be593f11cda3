use std::process::ExitCode;

use babymaker_core::Looper;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

/// Environment variable holding a log filter which overrides `--log-level`.
const LOG_ENV: &str = "BABYMAKER_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = cli
        .looper_options()
        .and_then(Looper::new)
        .and_then(Looper::run);
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
