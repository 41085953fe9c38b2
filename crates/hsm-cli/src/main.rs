mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => commands::serve(config).await,
        Command::Status => commands::status(&cli.remote, cli.token).await,
        Command::Component(cmd) => commands::component(&cli.remote, cli.token, cmd).await,
        Command::Reservation(cmd) => commands::reservation(&cli.remote, cli.token, cmd).await,
        Command::Lock(cmd) => commands::lock(&cli.remote, cli.token, cmd).await,
        Command::Discover { bundle_path } => commands::discover(&cli.remote, cli.token, bundle_path).await,
    }
}
