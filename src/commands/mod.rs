mod ingest;
mod manage;
mod show;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::state::AppState;

/// District boundary cache builder backed by the Overpass API.
#[derive(Parser, Debug)]
#[command(name = "district-boundaries", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a city's districts from Overpass and cache their boundaries
    Ingest {
        /// Key the city is cached under, e.g. `khv`
        city_code: String,
        /// Name as tagged in OSM, e.g. `Хабаровск`
        city_name: String,
    },
    /// List cached cities, or one city's districts
    Show { city_code: Option<String> },
    /// Remove one city from the cache
    Delete { city_code: String },
    /// Drop the whole cache document
    Invalidate,
    /// Replace the cache document with a saved JSON file
    Restore { file: PathBuf },
}

pub async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Ingest {
            city_code,
            city_name,
        } => ingest::ingest(state, &city_code, &city_name).await,
        Command::Show { city_code } => show::show(state, city_code.as_deref()).await,
        Command::Delete { city_code } => manage::delete(state, &city_code).await,
        Command::Invalidate => manage::invalidate(state).await,
        Command::Restore { file } => manage::restore(state, &file).await,
    }
}
