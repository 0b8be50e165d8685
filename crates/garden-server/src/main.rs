//! Headless garden runner and maintenance command line.

mod commands;
mod telemetry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use garden_core::{Clock, ElementTypeId, GardenConfig, SystemClock};
use garden_world::{FileStore, KeyValueStore, LoadOutcome, SimulationEngine, SimulationRunner};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Persistent garden ecosystem simulation")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "GARDEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Storage directory, overriding the configured one
    #[arg(long, env = "GARDEN_DATA_DIR", global = true)]
    data_dir: Option<String>,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the simulation on its wall-clock schedule until interrupted
    Run {
        /// Speed multiplier applied to the cycle interval
        #[arg(long, default_value_t = 1)]
        speed: u32,

        /// Do not plant the demo layout into a fresh garden
        #[arg(long)]
        no_seed: bool,
    },
    /// Place an element, e.g. `place OAK_TREE 10 12 --actor alice`
    Place {
        element: ElementTypeId,
        x: i32,
        y: i32,
        #[arg(long, default_value = "player")]
        actor: String,
        #[arg(long)]
        ignore_cooldown: bool,
    },
    /// Garden statistics
    Stats,
    /// Oldest living elements
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Elements placed by an actor
    Contributions { actor: String },
    /// Describe a tile and its occupants
    Inspect { x: i32, y: i32 },
    /// Run cycles immediately
    Cycles { count: u64 },
    /// Plant the demo layout
    Seed,
    /// Remove every element
    Clear,
    /// Fill every tile's moisture
    WaterAll,
    /// Fill every tile's sunlight
    SunlightAll,
    /// Kill every living plant
    KillPlants,
    /// Kill the occupant of one tile layer
    Kill {
        x: i32,
        y: i32,
        /// Target the atmospheric layer instead of the ground
        #[arg(long)]
        atmospheric: bool,
    },
    /// Forget the placement cooldown of one actor, or of everyone
    ResetCooldown { actor: Option<String> },
    /// Delete all stored state and start a new garden
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => GardenConfig::from_json_file(path)?,
        None => GardenConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }

    telemetry::init_telemetry(&config.logging)?;

    info!("Opening garden at {}", config.storage.data_dir);

    // Single writer: a running loop and one-shot commands never save over
    // each other's snapshot
    let file_store = FileStore::new(&config.storage.data_dir);
    let _lock = file_store.lock()?;

    let store: Arc<dyn KeyValueStore> = Arc::new(file_store);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut engine = SimulationEngine::new(config, store, clock)?;
    let outcome = engine.load_state();

    match cli.command {
        Command::Run { speed, no_seed } => run(engine, outcome, speed, no_seed).await,
        command => commands::execute(&mut engine, command, cli.json),
    }
}

async fn run(
    mut engine: SimulationEngine,
    outcome: LoadOutcome,
    speed: u32,
    no_seed: bool,
) -> Result<()> {
    if !outcome.is_restored() && !no_seed {
        engine.seed_garden();
    }

    let engine = Arc::new(Mutex::new(engine));
    let mut runner = SimulationRunner::new(Arc::clone(&engine));
    runner.set_speed(speed.max(1));

    shutdown_signal().await;

    info!("Shutting down garden");
    runner.shutdown().await;

    let engine = engine.lock();
    engine.save_state();
    let stats = engine.stats();
    record_gauge!("final_ecosystem_health", stats.ecosystem_health);
    info!(
        cycle_count = stats.cycle_count,
        living = stats.total_elements,
        "Garden stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
