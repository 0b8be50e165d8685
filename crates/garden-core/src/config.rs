//! Configuration types for the simulation.

use crate::catalog::CYCLES_PER_DAY;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Largest accepted grid side length
pub const MAX_GRID_SIZE: usize = 1024;

/// Grid dimensions and the resource levels of a fresh tile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Side length of the square grid
    pub size: usize,
    pub initial_moisture: f64,
    pub initial_sunlight: f64,
    pub initial_nutrients: f64,
    /// Degrees celsius; persisted but not used by any rule
    pub initial_temperature: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 50,
            initial_moisture: 30.0,
            initial_sunlight: 70.0,
            initial_nutrients: 50.0,
            initial_temperature: 20.0,
        }
    }
}

/// Per-cycle resource drift applied to every tile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub evaporation_per_cycle: f64,
    pub nutrient_regen_per_cycle: f64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            evaporation_per_cycle: 5.0,
            nutrient_regen_per_cycle: 1.0,
        }
    }
}

/// Plant survival, consumption and spreading rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    pub min_moisture_to_survive: f64,
    /// Dry cycles tolerated before wilting damage starts
    pub wilting_cycles: u32,
    pub wilting_damage: f64,
    pub sunlight_damage: f64,
    pub recovery_per_cycle: f64,
    pub moisture_draw: f64,
    pub nutrient_draw: f64,
    /// Nutrients returned to the tile when a plant dies
    pub decomposition_nutrients: f64,
    pub spread_min_age: u64,
    pub spread_chance: f64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            min_moisture_to_survive: 20.0,
            wilting_cycles: 3,
            wilting_damage: 10.0,
            sunlight_damage: 5.0,
            recovery_per_cycle: 2.0,
            moisture_draw: 3.0,
            nutrient_draw: 2.0,
            decomposition_nutrients: 20.0,
            spread_min_age: CYCLES_PER_DAY,
            spread_chance: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Sunlight removed from each tile under a shade provider
    pub shade_amount: f64,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self { shade_amount: 30.0 }
    }
}

/// Wall-clock scheduling, day/night and corpse retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub cycle_interval_ms: u64,
    pub season_duration_ms: u64,
    /// First local hour counted as day
    pub day_start_hour: u32,
    /// First local hour counted as night
    pub night_start_hour: u32,
    pub day_sunlight: f64,
    /// Fraction of day sunlight available at night
    pub night_sunlight_factor: f64,
    /// Cycles a dead entity stays visible before removal
    pub dead_grace_cycles: u32,
    /// Missed cycles at or above this count are skipped instead of replayed
    pub catch_up_ceiling: u64,
    /// Emit a stats log line every N cycles (0 disables)
    pub stats_log_interval: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5 * 60 * 1000,
            season_duration_ms: 7 * 24 * 60 * 60 * 1000,
            day_start_hour: 6,
            night_start_hour: 20,
            day_sunlight: 100.0,
            night_sunlight_factor: 0.3,
            dead_grace_cycles: 5,
            catch_up_ceiling: 100,
            stats_log_interval: 12,
        }
    }
}

impl ScheduleConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn season_duration(&self) -> Duration {
        Duration::from_millis(self.season_duration_ms)
    }
}

/// Saturation points of the ecosystem health score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthScoreConfig {
    /// Living entity count at which the entity component maxes out
    pub entity_saturation: f64,
    /// Occupancy ratio at which the occupancy component maxes out
    pub occupancy_saturation: f64,
}

impl Default for HealthScoreConfig {
    fn default() -> Self {
        Self {
            entity_saturation: 50.0,
            occupancy_saturation: 0.1,
        }
    }
}

/// Per-actor placement limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub cooldown_ms: u64,
    pub enforce_cooldown: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 24 * 60 * 60 * 1000,
            enforce_cooldown: true,
        }
    }
}

impl PlacementConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the file-backed key-value store
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/garden".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,garden_server=debug,garden_world=debug".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GardenConfig {
    /// Seed for spreading and other random choices
    pub seed: u64,
    pub grid: GridConfig,
    pub tile: TileConfig,
    pub survival: SurvivalConfig,
    pub effects: EffectsConfig,
    pub schedule: ScheduleConfig,
    pub health_score: HealthScoreConfig,
    pub placement: PlacementConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl GardenConfig {
    /// Load from a JSON file. Missing fields fall back to their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: GardenConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.size == 0 || self.grid.size > MAX_GRID_SIZE {
            return Err(Error::Config(format!(
                "grid.size must be within 1..={MAX_GRID_SIZE}, got {}",
                self.grid.size
            )));
        }
        if self.schedule.cycle_interval_ms == 0 {
            return Err(Error::Config(
                "schedule.cycle_interval_ms must be positive".to_string(),
            ));
        }
        if self.schedule.season_duration_ms == 0 {
            return Err(Error::Config(
                "schedule.season_duration_ms must be positive".to_string(),
            ));
        }
        if self.schedule.day_start_hour >= self.schedule.night_start_hour
            || self.schedule.night_start_hour > 24
        {
            return Err(Error::Config(format!(
                "day hours must satisfy day_start_hour < night_start_hour <= 24, got {}..{}",
                self.schedule.day_start_hour, self.schedule.night_start_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.survival.spread_chance) {
            return Err(Error::Config(
                "survival.spread_chance must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
