//! Square grid of tiles with spatial and aggregate queries.

use crate::entity::Entity;
use crate::tile::{Tile, RESOURCE_MAX};
use garden_core::{
    Direction, EntityId, GridConfig, HealthScoreConfig, Layer, Position, SurvivalConfig,
    TileConfig,
};
use tracing::{debug, warn};

/// Location of an entity inside the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHandle {
    pub position: Position,
    pub layer: Layer,
    pub id: EntityId,
}

/// A fixed-size N×N grid, stored row-major
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    tiles: Vec<Tile>,
    defaults: GridConfig,
}

impl Grid {
    pub fn new(config: &GridConfig) -> Self {
        let size = config.size;
        let mut tiles = Vec::with_capacity(size * size);
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                tiles.push(Tile::new(x, y, config));
            }
        }

        Self {
            size,
            tiles,
            defaults: config.clone(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Resource levels a fresh tile starts with
    pub fn defaults(&self) -> &GridConfig {
        &self.defaults
    }

    pub fn contains(&self, pos: Position) -> bool {
        let size = self.size as i32;
        (0..size).contains(&pos.x) && (0..size).contains(&pos.y)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        Some(pos.y as usize * self.size + pos.x as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile_at(Position::new(x, y))
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.tile_at_mut(Position::new(x, y))
    }

    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        self.index(pos).map(|index| &self.tiles[index])
    }

    pub fn tile_at_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        match self.index(pos) {
            Some(index) => Some(&mut self.tiles[index]),
            None => None,
        }
    }

    pub(crate) fn replace_tile(&mut self, tile: Tile) -> bool {
        match self.index(tile.position()) {
            Some(index) => {
                self.tiles[index] = tile;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// In-bounds positions of the inclusive square around `center`
    /// In-bounds positions within Chebyshev distance `radius` of `center`,
    /// center included
    pub fn positions_in_radius(&self, center: Position, radius: i32) -> Vec<Position> {
        let radius = radius.max(0);
        let last = self.size as i32 - 1;
        let (x0, x1) = (
            center.x.saturating_sub(radius).max(0),
            center.x.saturating_add(radius).min(last),
        );
        let (y0, y1) = (
            center.y.saturating_sub(radius).max(0),
            center.y.saturating_add(radius).min(last),
        );

        (y0..=y1)
            .flat_map(|y| (x0..=x1).map(move |x| Position::new(x, y)))
            .filter(|pos| pos.chebyshev_distance(&center) <= radius)
            .collect()
    }

    pub fn tiles_in_radius(&self, center: Position, radius: i32) -> Vec<&Tile> {
        self.positions_in_radius(center, radius)
            .into_iter()
            .filter_map(|pos| self.tile_at(pos))
            .collect()
    }

    /// In-bounds cardinal neighbors
    pub fn adjacent_positions(&self, pos: Position) -> Vec<Position> {
        Direction::all()
            .into_iter()
            .map(|direction| {
                let (dx, dy) = direction.to_delta();
                pos.add(dx, dy)
            })
            .filter(|neighbor| self.contains(*neighbor))
            .collect()
    }

    pub fn adjacent_tiles(&self, pos: Position) -> Vec<&Tile> {
        self.adjacent_positions(pos)
            .into_iter()
            .filter_map(|neighbor| self.tile_at(neighbor))
            .collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.tiles.iter().flat_map(|tile| tile.entities())
    }

    pub fn living_entities(&self) -> Vec<&Entity> {
        self.entities().filter(|entity| entity.is_alive).collect()
    }

    pub fn dead_entities(&self) -> Vec<&Entity> {
        self.entities().filter(|entity| !entity.is_alive).collect()
    }

    /// Living entities in scan order, captured before a cycle mutates the grid
    pub fn living_handles(&self) -> Vec<EntityHandle> {
        self.tiles
            .iter()
            .flat_map(|tile| {
                Layer::all().into_iter().filter_map(move |layer| {
                    tile.entity(layer)
                        .filter(|entity| entity.is_alive)
                        .map(|entity| EntityHandle {
                            position: tile.position(),
                            layer,
                            id: entity.id,
                        })
                })
            })
            .collect()
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities().find(|entity| entity.id == id)
    }

    pub fn occupied_tile_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.is_occupied()).count()
    }

    /// Unweighted mean moisture over every tile
    pub fn average_moisture(&self) -> f64 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        let total: f64 = self.tiles.iter().map(|tile| tile.moisture).sum();
        total / self.tiles.len() as f64
    }

    /// Composite 0-100 score: 40% living entity count, 30% average moisture,
    /// 30% occupancy, each saturating. Rounded once at the end.
    pub fn ecosystem_health(&self, config: &HealthScoreConfig) -> u32 {
        let living = self.living_entities().len() as f64;
        let occupancy = if self.tiles.is_empty() {
            0.0
        } else {
            living / self.tiles.len() as f64
        };

        let entity_score = if config.entity_saturation > 0.0 {
            (living / config.entity_saturation * RESOURCE_MAX).min(RESOURCE_MAX)
        } else {
            RESOURCE_MAX
        };
        let occupancy_score = if config.occupancy_saturation > 0.0 {
            (occupancy / config.occupancy_saturation * RESOURCE_MAX).min(RESOURCE_MAX)
        } else {
            RESOURCE_MAX
        };

        let score =
            entity_score * 0.4 + self.average_moisture() * 0.3 + occupancy_score * 0.3;
        score.round().clamp(0.0, RESOURCE_MAX) as u32
    }

    pub fn reset_sunlight(&mut self, level: f64) {
        for tile in &mut self.tiles {
            tile.sunlight = level.clamp(0.0, RESOURCE_MAX);
        }
    }

    /// Recompute shade: every live shade provider darkens the tiles around it,
    /// excluding its own.
    pub fn apply_shade_effects(&mut self, amount: f64) {
        for tile in &mut self.tiles {
            tile.effects.shade = 0.0;
        }

        let providers: Vec<(Position, i32)> = self
            .entities()
            .filter(|entity| entity.is_alive && entity.element_type().provides_shade)
            .filter_map(|entity| {
                entity
                    .position()
                    .map(|pos| (pos, entity.element_type().shade_radius.max(1)))
            })
            .collect();

        for (center, radius) in providers {
            for pos in self.positions_in_radius(center, radius) {
                if pos == center {
                    continue;
                }
                if let Some(tile) = self.tile_at_mut(pos) {
                    tile.apply_shade(amount);
                    tile.effects.shade += amount;
                }
            }
        }
    }

    /// Recompute fertilization from compost occupants, topping up nutrients
    /// in their radius.
    pub fn apply_compost_effects(&mut self) {
        for tile in &mut self.tiles {
            tile.effects.growth_bonus = 1.0;
            tile.effects.nutrient_bonus = 0.0;
        }

        let sources: Vec<(Position, i32, f64, f64)> = self
            .entities()
            .filter(|entity| {
                let element_type = entity.element_type();
                element_type.permanent
                    && (element_type.growth_boost > 1.0 || element_type.nutrient_boost > 0.0)
            })
            .filter_map(|entity| {
                let element_type = entity.element_type();
                entity.position().map(|pos| {
                    (
                        pos,
                        element_type.effect_radius.max(1),
                        element_type.growth_boost,
                        element_type.nutrient_boost,
                    )
                })
            })
            .collect();

        for (center, radius, growth_boost, nutrient_boost) in sources {
            for pos in self.positions_in_radius(center, radius) {
                if let Some(tile) = self.tile_at_mut(pos) {
                    tile.effects.growth_bonus = growth_boost.max(1.0);
                    tile.effects.nutrient_bonus = nutrient_boost;
                    tile.add_nutrients(nutrient_boost);
                }
            }
        }
    }

    pub fn update_cycle(&mut self, config: &TileConfig) {
        for tile in &mut self.tiles {
            tile.update_cycle(config);
        }
    }

    /// Age every corpse by one sweep and remove those dead for longer than
    /// `grace_cycles`.
    pub fn sweep_dead(&mut self, grace_cycles: u32) -> Vec<Entity> {
        let mut removed = Vec::new();
        for tile in &mut self.tiles {
            let mut expired = Vec::new();
            for entity in tile.entities_mut().filter(|entity| !entity.is_alive) {
                entity.cycles_dead = entity.cycles_dead.saturating_add(1);
                if entity.cycles_dead > grace_cycles {
                    expired.push(entity.id);
                }
            }
            for id in expired {
                removed.extend(tile.remove_entity(Some(id)));
            }
        }
        removed
    }

    /// Kill the occupant of `layer` at `pos`. Returns whether anything died.
    pub fn kill_at(&mut self, pos: Position, layer: Layer, survival: &SurvivalConfig) -> bool {
        let Some(mut entity) = self.tile_at_mut(pos).and_then(|tile| tile.detach(layer)) else {
            return false;
        };
        let died = entity.die_in(self, survival);
        if died {
            debug!(event = "entity_killed", id = %entity.id, position = %pos, "Entity killed");
        }
        if let Some(tile) = self.tile_at_mut(pos) {
            if let Err(entity) = tile.reattach(entity) {
                warn!(
                    event = "entity_reattach_failed",
                    id = %entity.id,
                    position = %pos,
                    layer = %layer,
                    "Slot was refilled while the entity was detached; dropping it"
                );
            }
        }
        died
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_core::ElementTypeId;

    fn grid(size: usize) -> Grid {
        Grid::new(&GridConfig {
            size,
            ..GridConfig::default()
        })
    }

    fn place(grid: &mut Grid, type_id: ElementTypeId, x: i32, y: i32) {
        grid.tile_mut(x, y)
            .unwrap()
            .place_entity(Entity::new(type_id, "tester", 0))
            .unwrap();
    }

    #[test]
    fn test_grid_creation() {
        let grid = grid(10);
        assert_eq!(grid.size(), 10);
        assert_eq!(grid.tile_count(), 100);
        assert_eq!(grid.tile(3, 7).unwrap().position(), Position::new(3, 7));
    }

    #[test]
    fn test_out_of_bounds_lookup_is_absent() {
        let grid = grid(10);
        assert!(grid.tile(-1, 0).is_none());
        assert!(grid.tile(0, 10).is_none());
        assert!(grid.tile(10, 10).is_none());
    }

    #[test]
    fn test_radius_query_clips_to_bounds() {
        let grid = grid(10);
        assert_eq!(grid.tiles_in_radius(Position::new(5, 5), 1).len(), 9);
        assert_eq!(grid.tiles_in_radius(Position::new(0, 0), 1).len(), 4);
        assert_eq!(grid.tiles_in_radius(Position::new(5, 5), 2).len(), 25);
        assert_eq!(grid.tiles_in_radius(Position::new(5, 5), 0).len(), 1);
        assert_eq!(grid.tiles_in_radius(Position::new(5, 5), i32::MAX).len(), 100);
        assert!(grid.tiles_in_radius(Position::new(-20, 3), 1).is_empty());
    }

    #[test]
    fn test_adjacent_counts() {
        let grid = grid(10);
        assert_eq!(grid.adjacent_tiles(Position::new(0, 0)).len(), 2);
        assert_eq!(grid.adjacent_tiles(Position::new(0, 5)).len(), 3);
        assert_eq!(grid.adjacent_tiles(Position::new(5, 5)).len(), 4);
    }

    #[test]
    fn test_living_and_dead_scan_both_layers() {
        let mut grid = grid(5);
        place(&mut grid, ElementTypeId::OakTree, 1, 1);
        place(&mut grid, ElementTypeId::RainCloud, 1, 1);
        place(&mut grid, ElementTypeId::GrassPatch, 2, 2);
        grid.tile_mut(2, 2).unwrap().entity_mut(Layer::Ground).unwrap().die();

        assert_eq!(grid.living_entities().len(), 2);
        assert_eq!(grid.dead_entities().len(), 1);
        assert_eq!(grid.occupied_tile_count(), 2);

        let handles = grid.living_handles();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].layer, Layer::Ground);
        assert_eq!(handles[1].layer, Layer::Atmospheric);
    }

    #[test]
    fn test_average_moisture() {
        let mut grid = grid(2);
        grid.tile_mut(0, 0).unwrap().moisture = 70.0;
        assert_eq!(grid.average_moisture(), 40.0);
    }

    #[test]
    fn test_health_improves_with_living_entities() {
        let config = HealthScoreConfig::default();
        let mut grid = grid(10);
        let empty_health = grid.ecosystem_health(&config);
        // 30% of the default 30 moisture
        assert_eq!(empty_health, 9);

        for i in 0..20 {
            place(&mut grid, ElementTypeId::GrassPatch, i % 10, i / 10);
            grid.tile_mut(i % 10, i / 10).unwrap().moisture = 80.0;
        }
        assert!(grid.ecosystem_health(&config) > empty_health);
    }

    #[test]
    fn test_shade_excludes_center_and_accumulates() {
        let mut grid = grid(10);
        place(&mut grid, ElementTypeId::OakTree, 4, 4);
        place(&mut grid, ElementTypeId::OakTree, 6, 4);
        grid.reset_sunlight(100.0);
        grid.apply_shade_effects(30.0);

        let center = grid.tile(4, 4).unwrap();
        // Shaded only by the other oak
        assert_eq!(center.effects.shade, 30.0);
        assert_eq!(center.sunlight, 70.0);

        let between = grid.tile(5, 4).unwrap();
        assert_eq!(between.effects.shade, 60.0);
        assert_eq!(between.sunlight, 40.0);

        assert_eq!(grid.tile(9, 9).unwrap().effects.shade, 0.0);
    }

    #[test]
    fn test_dead_trees_cast_no_shade() {
        let mut grid = grid(5);
        place(&mut grid, ElementTypeId::OakTree, 2, 2);
        grid.tile_mut(2, 2).unwrap().entity_mut(Layer::Ground).unwrap().die();
        grid.reset_sunlight(100.0);
        grid.apply_shade_effects(30.0);
        assert!(grid.iter().all(|tile| tile.sunlight == 100.0));
    }

    #[test]
    fn test_shade_pass_is_idempotent() {
        let mut grid = grid(6);
        place(&mut grid, ElementTypeId::Boulder, 3, 3);
        grid.reset_sunlight(100.0);
        grid.apply_shade_effects(30.0);
        let first: Vec<f64> = grid.iter().map(|tile| tile.effects.shade).collect();

        grid.reset_sunlight(100.0);
        grid.apply_shade_effects(30.0);
        let second: Vec<f64> = grid.iter().map(|tile| tile.effects.shade).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compost_sets_bonuses_in_radius() {
        let mut grid = grid(6);
        place(&mut grid, ElementTypeId::CompostPile, 2, 2);
        grid.apply_compost_effects();

        let center = grid.tile(2, 2).unwrap();
        assert_eq!(center.effects.growth_bonus, 1.5);
        assert_eq!(center.effects.nutrient_bonus, 50.0);
        assert_eq!(center.nutrients, 100.0);
        assert_eq!(grid.tile(3, 3).unwrap().effects.growth_bonus, 1.5);
        assert_eq!(grid.tile(4, 4).unwrap().effects, Default::default());

        // Reruns reset before applying
        grid.apply_compost_effects();
        assert_eq!(grid.tile(2, 2).unwrap().effects.growth_bonus, 1.5);
    }

    #[test]
    fn test_sweep_respects_grace_window() {
        let mut grid = grid(3);
        place(&mut grid, ElementTypeId::Wildflower, 0, 0);
        grid.tile_mut(0, 0).unwrap().entity_mut(Layer::Ground).unwrap().die();

        for _ in 0..3 {
            assert!(grid.sweep_dead(3).is_empty());
        }
        let removed = grid.sweep_dead(3);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].position(), None);
        assert!(!grid.tile(0, 0).unwrap().is_occupied());
    }

    #[test]
    fn test_kill_at_decomposes_plants() {
        let mut grid = grid(3);
        place(&mut grid, ElementTypeId::GrassPatch, 1, 1);
        let survival = SurvivalConfig::default();

        assert!(grid.kill_at(Position::new(1, 1), Layer::Ground, &survival));
        assert!(!grid.kill_at(Position::new(1, 1), Layer::Ground, &survival));
        assert!(!grid.kill_at(Position::new(1, 1), Layer::Atmospheric, &survival));

        let tile = grid.tile(1, 1).unwrap();
        assert!(!tile.ground_entity().unwrap().is_alive);
        assert_eq!(tile.ground_entity().unwrap().position(), Some(Position::new(1, 1)));
        assert_eq!(tile.nutrients, 70.0);
        assert_eq!(grid.dead_entities().len(), 1);
    }
}
