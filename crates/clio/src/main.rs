//! Clio - entry point.

use std::process::ExitCode;

use clap::Parser;

use clio::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match clio::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Clio exited with an error");
            eprintln!("clio: {err:#}");
            ExitCode::FAILURE
        }
    }
}
