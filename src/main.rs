mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match &cli.command {
        Commands::Plan { modules, format } => {
            cli::plan(&cli, modules, format)?;
        }
        Commands::Order { modules } => {
            cli::order(&cli, modules)?;
        }
        Commands::Sources { module } => {
            cli::sources(&cli, module)?;
        }
        Commands::Modules { format } => {
            cli::modules(&cli, format)?;
        }
        Commands::Includes(args) => {
            cli::includes(&cli, args)?;
        }
    }

    Ok(())
}
