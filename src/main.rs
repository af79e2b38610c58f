mod boundary;
mod cache;
mod commands;
mod overpass;
mod pipeline;
mod state;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use commands::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let state = AppState::from_env()?;
    state.init().await?;
    info!("Starting district-boundaries...");

    let result = commands::run(&state, cli.command).await;
    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }

    state.close().await?;
    result
}
