//! Placed elements.
//!
//! An [`Entity`] is the common record shared by every placed element. The
//! plant or environmental behavior lives in the [`EntityState`] payload and is
//! dispatched on it; see `plant.rs` and `environmental.rs`.

use crate::grid::Grid;
use crate::tile::RESOURCE_MAX;
use garden_core::{
    Category, ElementType, ElementTypeId, EntityId, GardenConfig, Layer, Position, Season,
    SurvivalConfig,
};
use rand::Rng;

pub const DEAD_COLOR: &str = "#795548";

/// Inputs shared by every entity update in one cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub season: Season,
    pub config: &'a GardenConfig,
    /// Wall-clock time of the cycle in epoch milliseconds
    pub timestamp_ms: i64,
}

/// What happened to an entity during its update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub died: bool,
    pub spawned: Option<EntityId>,
}

impl UpdateOutcome {
    pub(crate) fn died() -> Self {
        Self {
            died: true,
            spawned: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlantState {
    pub cycles_without_water: u32,
    pub has_flowered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentalState {
    pub has_activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityState {
    Plant(PlantState),
    Environmental(EnvironmentalState),
}

impl EntityState {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Plant => EntityState::Plant(PlantState::default()),
            Category::Environmental => EntityState::Environmental(EnvironmentalState::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub type_id: ElementTypeId,
    pub placed_by: String,
    /// Epoch milliseconds
    pub placed_at: i64,
    /// Cycles survived since placement
    pub age: u64,
    pub is_alive: bool,
    pub health: f64,
    pub growth_progress: f64,
    pub current_stage: u32,
    /// Sweeps this entity has been seen dead
    pub cycles_dead: u32,
    pub state: EntityState,
    position: Option<Position>,
}

impl Entity {
    pub fn new(type_id: ElementTypeId, placed_by: impl Into<String>, placed_at: i64) -> Self {
        Self {
            id: EntityId::new(),
            type_id,
            placed_by: placed_by.into(),
            placed_at,
            age: 0,
            is_alive: true,
            health: RESOURCE_MAX,
            growth_progress: 0.0,
            current_stage: 0,
            cycles_dead: 0,
            state: EntityState::for_category(type_id.descriptor().category),
            position: None,
        }
    }

    pub fn element_type(&self) -> &'static ElementType {
        self.type_id.descriptor()
    }

    pub fn layer(&self) -> Layer {
        self.type_id.layer()
    }

    pub fn is_plant(&self) -> bool {
        matches!(self.state, EntityState::Plant(_))
    }

    /// Coordinates of the tile holding this entity, `None` once orphaned
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    pub fn plant_state(&self) -> Option<&PlantState> {
        match &self.state {
            EntityState::Plant(state) => Some(state),
            EntityState::Environmental(_) => None,
        }
    }

    pub fn environmental_state(&self) -> Option<&EnvironmentalState> {
        match &self.state {
            EntityState::Environmental(state) => Some(state),
            EntityState::Plant(_) => None,
        }
    }

    /// Mark dead. Returns `true` only on the alive to dead transition.
    pub fn die(&mut self) -> bool {
        if !self.is_alive {
            return false;
        }
        self.is_alive = false;
        self.health = 0.0;
        true
    }

    /// Kill and apply the death side effect on the occupied tile. Plants
    /// return nutrients to the soil exactly once.
    pub fn die_in(&mut self, grid: &mut Grid, survival: &SurvivalConfig) -> bool {
        if !self.die() {
            return false;
        }
        if self.is_plant() {
            if let Some(tile) = self.position.and_then(|pos| grid.tile_at_mut(pos)) {
                tile.add_nutrients(survival.decomposition_nutrients);
            }
        }
        true
    }

    /// Advance one cycle. No-op when dead or unplaced.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        grid: &mut Grid,
        ctx: &CycleContext<'_>,
        rng: &mut R,
    ) -> UpdateOutcome {
        if !self.is_alive || self.position.is_none() {
            return UpdateOutcome::default();
        }

        self.age += 1;

        match self.state {
            EntityState::Plant(_) => self.update_plant(grid, ctx, rng),
            EntityState::Environmental(_) => self.update_environmental(grid, ctx),
        }
    }

    pub fn age_in_days(&self) -> u64 {
        self.age / garden_core::CYCLES_PER_DAY
    }

    /// Multi-line status text for inspection
    pub fn describe(&self, grid: &Grid) -> String {
        match self.state {
            EntityState::Plant(_) => self.describe_plant(grid),
            EntityState::Environmental(_) => self.describe_environmental(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.state {
            EntityState::Plant(_) => self.plant_icon(),
            EntityState::Environmental(_) => self.element_type().icon,
        }
    }

    pub fn color(&self) -> &'static str {
        if !self.is_alive {
            return DEAD_COLOR;
        }
        match self.state {
            EntityState::Plant(_) => self.plant_color(),
            EntityState::Environmental(_) => self.element_type().color,
        }
    }
}
