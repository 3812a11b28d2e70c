//! Binary entrypoint: parse CLI flags and hand off to the server builder.

use std::process::ExitCode;

use clap::Parser;
use model_gateway::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match model_gateway::server::run_server(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
