//! vaultstrap - bring a managed node from nothing to converged.

use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cli.global.init_logging()?;

    match cli.command {
        Commands::Create(args) => commands::create::execute(args, &cli.global).await,
        Commands::Runs(args) => commands::runs::execute(args, &cli.global).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args, &cli.global).await,
    }
}
