//! JSON snapshot records for the grid and the engine.
//!
//! Snapshots are sparse: only tiles holding an entity or whose moisture
//! differs from the fresh-tile default are written. Restoring rebuilds a
//! default grid and overlays the records.

use crate::entity::{Entity, EntityState};
use crate::grid::Grid;
use crate::tile::{clamp_resource, Tile};
use garden_core::{ElementTypeId, EntityId, Error, GridConfig, Position, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Catalog key; kept as a string so unknown types can be skipped on load
    pub type_id: String,
    pub id: EntityId,
    pub placed_by: String,
    pub placed_at: i64,
    pub age: u64,
    pub is_alive: bool,
    pub health: f64,
    #[serde(default)]
    pub growth_progress: f64,
    #[serde(default)]
    pub current_stage: u32,
    #[serde(default)]
    pub cycles_without_water: u32,
    #[serde(default)]
    pub has_flowered: bool,
    #[serde(default)]
    pub has_activated: bool,
    #[serde(default)]
    pub cycles_dead: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub moisture: f64,
    pub sunlight: f64,
    pub nutrients: f64,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_entity: Option<EntityRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atmospheric_entity: Option<EntityRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub size: usize,
    pub tiles: Vec<TileRecord>,
}

/// Everything the engine persists after a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub grid: GridSnapshot,
    pub cycle_count: u64,
    /// Epoch milliseconds of the write
    pub timestamp: i64,
}

impl SimulationSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&Entity> for EntityRecord {
    fn from(entity: &Entity) -> Self {
        let (cycles_without_water, has_flowered, has_activated) = match &entity.state {
            EntityState::Plant(state) => {
                (state.cycles_without_water, state.has_flowered, false)
            }
            EntityState::Environmental(state) => (0, false, state.has_activated),
        };

        Self {
            type_id: entity.type_id.as_str().to_string(),
            id: entity.id,
            placed_by: entity.placed_by.clone(),
            placed_at: entity.placed_at,
            age: entity.age,
            is_alive: entity.is_alive,
            health: entity.health,
            growth_progress: entity.growth_progress,
            current_stage: entity.current_stage,
            cycles_without_water,
            has_flowered,
            has_activated,
            cycles_dead: entity.cycles_dead,
        }
    }
}

impl EntityRecord {
    /// Rebuild the typed entity. Unknown type ids yield `None`.
    pub fn to_entity(&self) -> Option<Entity> {
        let type_id: ElementTypeId = self.type_id.parse().ok()?;
        let element_type = type_id.descriptor();

        let mut state = EntityState::for_category(element_type.category);
        match &mut state {
            EntityState::Plant(plant) => {
                plant.cycles_without_water = self.cycles_without_water;
                plant.has_flowered = self.has_flowered;
            }
            EntityState::Environmental(environmental) => {
                environmental.has_activated = self.has_activated;
            }
        }

        let mut entity = Entity::new(type_id, self.placed_by.clone(), self.placed_at);
        entity.id = self.id;
        entity.age = self.age;
        entity.is_alive = self.is_alive;
        entity.health = self.health.clamp(0.0, 100.0);
        entity.growth_progress = self.growth_progress;
        entity.current_stage = self.current_stage.min(element_type.growth_stages);
        entity.cycles_dead = self.cycles_dead;
        entity.state = state;
        Some(entity)
    }
}

impl From<&Tile> for TileRecord {
    fn from(tile: &Tile) -> Self {
        Self {
            x: tile.x(),
            y: tile.y(),
            moisture: tile.moisture,
            sunlight: tile.sunlight,
            nutrients: tile.nutrients,
            temperature: tile.temperature,
            ground_entity: tile.ground_entity().map(EntityRecord::from),
            atmospheric_entity: tile.atmospheric_entity().map(EntityRecord::from),
        }
    }
}

impl Tile {
    /// Rebuild a tile, re-linking each restored entity to it. Resources are
    /// clamped into range.
    pub fn from_record(record: &TileRecord, defaults: &GridConfig) -> Self {
        let mut tile = Tile::new(record.x, record.y, defaults);
        tile.moisture = clamp_resource(record.moisture);
        tile.sunlight = clamp_resource(record.sunlight);
        tile.nutrients = clamp_resource(record.nutrients);
        tile.temperature = record.temperature;

        for entity_record in record
            .ground_entity
            .iter()
            .chain(record.atmospheric_entity.iter())
        {
            let Some(entity) = entity_record.to_entity() else {
                warn!(
                    event = "snapshot_unknown_type",
                    type_id = %entity_record.type_id,
                    x = record.x,
                    y = record.y,
                    "Skipping entity with unknown type"
                );
                continue;
            };
            if let Err(entity) = tile.place_entity(entity) {
                warn!(
                    event = "snapshot_layer_conflict",
                    id = %entity.id,
                    x = record.x,
                    y = record.y,
                    "Skipping entity whose layer is already filled"
                );
            }
        }

        tile
    }
}

impl Grid {
    pub fn to_snapshot(&self) -> GridSnapshot {
        let initial_moisture = self.defaults().initial_moisture;
        let tiles = self
            .iter()
            .filter(|tile| tile.is_occupied() || tile.moisture != initial_moisture)
            .map(TileRecord::from)
            .collect();

        GridSnapshot {
            size: self.size(),
            tiles,
        }
    }

    /// Default grid with the records laid over it. The snapshot must have the
    /// configured size; out-of-bounds records are skipped.
    pub fn from_snapshot(snapshot: &GridSnapshot, defaults: &GridConfig) -> Result<Self> {
        if snapshot.size != defaults.size {
            return Err(Error::InvalidState(format!(
                "snapshot grid size {} does not match configured size {}",
                snapshot.size, defaults.size
            )));
        }
        let mut grid = Grid::new(defaults);

        for record in &snapshot.tiles {
            let tile = Tile::from_record(record, defaults);
            if !grid.replace_tile(tile) {
                warn!(
                    event = "snapshot_out_of_bounds",
                    position = %Position::new(record.x, record.y),
                    size = snapshot.size,
                    "Skipping tile record outside the grid"
                );
            }
        }

        Ok(grid)
    }
}
