use anyhow::Result;
use clap::Parser;
use ordwallet_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    ordwallet_cli::logging_init();

    let opts = Cli::parse();
    ordwallet_cli::entry(opts).await
}
