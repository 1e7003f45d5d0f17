//! GearWear maintenance tool.
//!
//! Thin operator wrapper over the library: run the pairing backfill for a
//! user, inspect a bike's components, or feed a ride into hours accounting.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use gearwear::components::{ComponentManager, RideUsage};
use gearwear::storage::{load_config, load_config_from, Database};
use gearwear::NoopPredictionCache;

#[derive(Parser)]
#[command(name = "gearwear")]
#[command(author, version, about = "Bicycle component lifecycle and wear accounting")]
struct Cli {
    /// Config file (default: platform data directory)
    #[arg(long, global = true, env = "GEARWEAR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split legacy single-unit tires, brakes and rotors into front/rear pairs
    MigratePairs {
        #[arg(long)]
        user: Uuid,
    },

    /// Print the components mounted on a bike as JSON
    Components {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        bike: Uuid,
    },

    /// Add a ride's duration to every component on a bike
    LogRide {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        bike: Uuid,
        #[arg(long)]
        seconds: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let db_path = config.database_path();
    tracing::debug!(path = %db_path.display(), "Opening database");
    let mut db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache).with_settings(config.engine.clone());

    match cli.command {
        Command::MigratePairs { user } => {
            let report = manager.migrate_paired_components(user)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Components { user, bike } => {
            let components = manager.list_bike_components(user, bike)?;
            println!("{}", serde_json::to_string_pretty(&components)?);
        }
        Command::LogRide {
            user,
            bike,
            seconds,
        } => {
            let rows = manager.record_ride_created(user, &RideUsage::new(Some(bike), seconds))?;
            tracing::info!(bike = %bike, rows, "Recorded ride hours");
        }
    }

    Ok(())
}
