use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so table/json/csv output on stdout stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobradar=info"));
    tracing_subscriber::registry()
        .with(
            cli.log_json.then(|| {
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_span_list(false)
            }),
        )
        .with((!cli.log_json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
        .with(filter)
        .init();

    cli::run(cli).await
}
