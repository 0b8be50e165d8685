//! Garden world: tiles, placed elements, the grid and the simulation engine.

pub mod entity;
pub mod environmental;
pub mod grid;
pub mod ledger;
pub mod plant;
pub mod runner;
pub mod simulation;
pub mod snapshot;
pub mod storage;
pub mod tile;

pub use entity::{CycleContext, Entity, EntityState, EnvironmentalState, PlantState, UpdateOutcome};
pub use grid::{EntityHandle, Grid};
pub use ledger::PlacementLedger;
pub use runner::SimulationRunner;
pub use simulation::{
    Contribution, CycleReport, GardenStats, LeaderboardEntry, Listener, LoadOutcome,
    SimulationEngine, SYSTEM_ACTOR,
};
pub use snapshot::{EntityRecord, GridSnapshot, SimulationSnapshot, TileRecord};
pub use storage::{keys, FileStore, KeyValueStore, MemoryStore, StoreLock, LOCK_FILE};
pub use tile::{Tile, TileEffects};
