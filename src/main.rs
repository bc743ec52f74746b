mod api;
mod cli;
mod logging;
mod model;
mod orchestrator;
mod panel;
mod push;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = !args.uses_tui();
    logging::init(logging::LogConfig::from_env(args.log_target()));

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit on success in non-TUI modes so a reconnecting push channel
            // can't hold the runtime open.
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
