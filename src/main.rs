use anyhow::Result;
use clap::Parser;
use guildbank::cli::{Cli, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter());
    cli.run().await
}
