use std::process::ExitCode;

use clap::Parser;
use scripts::{cli::Cli, errors::ScriptError};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> ExitCode {
    let Cli { global, verbose, command } = Cli::parse();

    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().pretty().with_max_level(level).init();

    match command.run(global.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ScriptError::Aborted) => {
            info!("operation cancelled, nothing was sent");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            if let Some(remedy) = e.remedy() {
                error!("to fix: {remedy}");
            }
            ExitCode::FAILURE
        }
    }
}
