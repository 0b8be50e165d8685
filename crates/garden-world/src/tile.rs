//! A single grid cell: resources, resident entities and the effects overlay.

use crate::entity::Entity;
use garden_core::{ElementType, EntityId, GridConfig, Layer, Position, RejectReason, TileConfig};

pub const RESOURCE_MIN: f64 = 0.0;
pub const RESOURCE_MAX: f64 = 100.0;

const COLOR_WET: &str = "#42A5F5";
const COLOR_MOIST: &str = "#7CB342";
const COLOR_DRY: &str = "#8B7355";
const COLOR_PARCHED: &str = "#D7CCC8";

pub(crate) fn clamp_resource(value: f64) -> f64 {
    value.clamp(RESOURCE_MIN, RESOURCE_MAX)
}

/// Derived per-cycle overlay, rebuilt from entity placements every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct TileEffects {
    /// Cumulative sunlight removed by shade providers this cycle
    pub shade: f64,
    pub nutrient_bonus: f64,
    /// Multiplicative growth factor, never below 1.0
    pub growth_bonus: f64,
}

impl Default for TileEffects {
    fn default() -> Self {
        Self {
            shade: 0.0,
            nutrient_bonus: 0.0,
            growth_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    position: Position,
    pub moisture: f64,
    pub sunlight: f64,
    pub nutrients: f64,
    pub temperature: f64,
    ground: Option<Entity>,
    atmospheric: Option<Entity>,
    pub effects: TileEffects,
}

impl Tile {
    pub fn new(x: i32, y: i32, config: &GridConfig) -> Self {
        Self {
            position: Position::new(x, y),
            moisture: config.initial_moisture,
            sunlight: config.initial_sunlight,
            nutrients: config.initial_nutrients,
            temperature: config.initial_temperature,
            ground: None,
            atmospheric: None,
            effects: TileEffects::default(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn x(&self) -> i32 {
        self.position.x
    }

    pub fn y(&self) -> i32 {
        self.position.y
    }

    pub fn entity(&self, layer: Layer) -> Option<&Entity> {
        match layer {
            Layer::Ground => self.ground.as_ref(),
            Layer::Atmospheric => self.atmospheric.as_ref(),
        }
    }

    pub fn entity_mut(&mut self, layer: Layer) -> Option<&mut Entity> {
        match layer {
            Layer::Ground => self.ground.as_mut(),
            Layer::Atmospheric => self.atmospheric.as_mut(),
        }
    }

    fn slot_mut(&mut self, layer: Layer) -> &mut Option<Entity> {
        match layer {
            Layer::Ground => &mut self.ground,
            Layer::Atmospheric => &mut self.atmospheric,
        }
    }

    pub fn ground_entity(&self) -> Option<&Entity> {
        self.ground.as_ref()
    }

    pub fn atmospheric_entity(&self) -> Option<&Entity> {
        self.atmospheric.as_ref()
    }

    /// Resident entities, ground layer first
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.ground.iter().chain(self.atmospheric.iter())
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.ground.iter_mut().chain(self.atmospheric.iter_mut())
    }

    pub fn is_occupied(&self) -> bool {
        self.ground.is_some() || self.atmospheric.is_some()
    }

    /// Bind `entity` to this tile if its layer is empty. On failure the entity
    /// is handed back untouched.
    pub fn place_entity(&mut self, mut entity: Entity) -> Result<(), Entity> {
        let position = self.position;
        let slot = self.slot_mut(entity.layer());
        if slot.is_some() {
            return Err(entity);
        }
        entity.set_position(Some(position));
        *slot = Some(entity);
        Ok(())
    }

    /// Remove the entity with `id`, or both layers when `id` is `None`.
    /// Removed entities come back orphaned (no tile reference).
    pub fn remove_entity(&mut self, id: Option<EntityId>) -> Vec<Entity> {
        let mut removed = Vec::new();
        for layer in Layer::all() {
            let slot = self.slot_mut(layer);
            let matches = match (slot.as_ref(), id) {
                (Some(_), None) => true,
                (Some(entity), Some(id)) => entity.id == id,
                (None, _) => false,
            };
            if matches {
                if let Some(mut entity) = slot.take() {
                    entity.set_position(None);
                    removed.push(entity);
                }
            }
        }
        removed
    }

    /// Take an entity out of its slot for an update without orphaning it
    pub(crate) fn detach(&mut self, layer: Layer) -> Option<Entity> {
        self.slot_mut(layer).take()
    }

    /// Return a detached entity to its slot
    pub(crate) fn reattach(&mut self, entity: Entity) -> Result<(), Entity> {
        let slot = self.slot_mut(entity.layer());
        if slot.is_some() {
            return Err(entity);
        }
        *slot = Some(entity);
        Ok(())
    }

    /// Dead occupants never block; live ones always do.
    pub fn can_place(&self, element_type: &ElementType) -> Result<(), RejectReason> {
        if self
            .entity(element_type.layer())
            .is_some_and(|entity| entity.is_alive)
        {
            return Err(RejectReason::LayerOccupied);
        }

        if element_type.needs_sunlight && self.sunlight < element_type.min_sunlight {
            return Err(RejectReason::InsufficientSunlight {
                required: element_type.min_sunlight,
                available: self.sunlight,
            });
        }

        Ok(())
    }

    /// Evaporation, nutrient regeneration and clamping. Sunlight is reset by
    /// the engine before shade is applied, not here.
    pub fn update_cycle(&mut self, config: &TileConfig) {
        self.moisture -= config.evaporation_per_cycle;

        if self.nutrients < RESOURCE_MAX {
            self.nutrients += config.nutrient_regen_per_cycle;
        }

        self.moisture = clamp_resource(self.moisture);
        self.sunlight = clamp_resource(self.sunlight);
        self.nutrients = clamp_resource(self.nutrients);
    }

    pub fn add_moisture(&mut self, amount: f64) {
        self.moisture = clamp_resource(self.moisture + amount);
    }

    pub fn add_sunlight(&mut self, amount: f64) {
        self.sunlight = clamp_resource(self.sunlight + amount);
    }

    pub fn add_nutrients(&mut self, amount: f64) {
        self.nutrients = clamp_resource(self.nutrients + amount);
    }

    pub fn consume_moisture(&mut self, amount: f64) {
        self.moisture = clamp_resource(self.moisture - amount);
    }

    pub fn consume_nutrients(&mut self, amount: f64) {
        self.nutrients = clamp_resource(self.nutrients - amount);
    }

    pub fn apply_shade(&mut self, amount: f64) {
        self.sunlight = (self.sunlight - amount).max(RESOURCE_MIN);
    }

    /// Render color: a live occupant's color, otherwise soil tinted by moisture
    pub fn color(&self) -> &'static str {
        if let Some(entity) = self.entities().find(|entity| entity.is_alive) {
            return entity.color();
        }

        let moisture_ratio = self.moisture / RESOURCE_MAX;
        if moisture_ratio > 0.7 {
            COLOR_WET
        } else if moisture_ratio > 0.4 {
            COLOR_MOIST
        } else if moisture_ratio > 0.2 {
            COLOR_DRY
        } else {
            COLOR_PARCHED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_core::ElementTypeId;
    use proptest::prelude::*;

    fn tile() -> Tile {
        Tile::new(3, 4, &GridConfig::default())
    }

    fn entity(type_id: ElementTypeId) -> Entity {
        Entity::new(type_id, "tester", 0)
    }

    #[test]
    fn test_new_tile_defaults() {
        let tile = tile();
        assert_eq!(tile.position(), Position::new(3, 4));
        assert_eq!(tile.moisture, 30.0);
        assert_eq!(tile.sunlight, 70.0);
        assert_eq!(tile.nutrients, 50.0);
        assert_eq!(tile.effects, TileEffects::default());
        assert!(!tile.is_occupied());
    }

    #[test]
    fn test_place_binds_back_reference() {
        let mut tile = tile();
        assert!(tile.place_entity(entity(ElementTypeId::OakTree)).is_ok());
        let placed = tile.ground_entity().unwrap();
        assert_eq!(placed.position(), Some(Position::new(3, 4)));
    }

    #[test]
    fn test_layers_are_independent() {
        let mut tile = tile();
        assert!(tile.place_entity(entity(ElementTypeId::OakTree)).is_ok());
        assert!(tile.place_entity(entity(ElementTypeId::RainCloud)).is_ok());
        assert!(tile.ground_entity().is_some());
        assert!(tile.atmospheric_entity().is_some());
    }

    #[test]
    fn test_place_into_full_layer_hands_entity_back() {
        let mut tile = tile();
        let first = entity(ElementTypeId::OakTree);
        let first_id = first.id;
        tile.place_entity(first).unwrap();

        let second = entity(ElementTypeId::Boulder);
        let second_id = second.id;
        let rejected = tile.place_entity(second).unwrap_err();
        assert_eq!(rejected.id, second_id);
        assert_eq!(rejected.position(), None);
        assert_eq!(tile.ground_entity().unwrap().id, first_id);
    }

    #[test]
    fn test_remove_specific_entity() {
        let mut tile = tile();
        let oak = entity(ElementTypeId::OakTree);
        let oak_id = oak.id;
        tile.place_entity(oak).unwrap();
        tile.place_entity(entity(ElementTypeId::Sunbeam)).unwrap();

        let removed = tile.remove_entity(Some(oak_id));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].position(), None);
        assert!(tile.ground_entity().is_none());
        assert!(tile.atmospheric_entity().is_some());
    }

    #[test]
    fn test_remove_without_id_clears_both_layers() {
        let mut tile = tile();
        tile.place_entity(entity(ElementTypeId::GrassPatch)).unwrap();
        tile.place_entity(entity(ElementTypeId::RainCloud)).unwrap();

        assert_eq!(tile.remove_entity(None).len(), 2);
        assert!(!tile.is_occupied());
        assert!(tile.remove_entity(None).is_empty());
    }

    #[test]
    fn test_can_place_respects_live_occupant_only() {
        let mut tile = tile();
        let oak = ElementTypeId::OakTree.descriptor();
        tile.place_entity(entity(ElementTypeId::GrassPatch)).unwrap();
        assert_eq!(tile.can_place(oak), Err(RejectReason::LayerOccupied));

        tile.entity_mut(Layer::Ground).unwrap().die();
        assert_eq!(tile.can_place(oak), Ok(()));

        // The atmospheric layer is unaffected by the ground occupant
        tile.place_entity(entity(ElementTypeId::Wildflower)).ok();
        assert!(tile.can_place(ElementTypeId::RainCloud.descriptor()).is_ok());
    }

    #[test]
    fn test_can_place_checks_sunlight() {
        let mut tile = tile();
        tile.sunlight = 55.0;
        assert!(tile.can_place(ElementTypeId::OakTree.descriptor()).is_ok());
        assert_eq!(
            tile.can_place(ElementTypeId::Wildflower.descriptor()),
            Err(RejectReason::InsufficientSunlight {
                required: 60.0,
                available: 55.0
            })
        );
        // Environmental elements do not care about light
        tile.sunlight = 0.0;
        assert!(tile.can_place(ElementTypeId::Boulder.descriptor()).is_ok());
    }

    #[test]
    fn test_update_cycle_evaporates_and_regenerates() {
        let mut tile = tile();
        tile.update_cycle(&TileConfig::default());
        assert_eq!(tile.moisture, 25.0);
        assert_eq!(tile.nutrients, 51.0);
        assert_eq!(tile.sunlight, 70.0);

        tile.moisture = 2.0;
        tile.nutrients = 100.0;
        tile.update_cycle(&TileConfig::default());
        assert_eq!(tile.moisture, 0.0);
        assert_eq!(tile.nutrients, 100.0);
    }

    #[test]
    fn test_bounded_helpers() {
        let mut tile = tile();
        tile.add_moisture(500.0);
        assert_eq!(tile.moisture, 100.0);
        tile.consume_moisture(150.0);
        assert_eq!(tile.moisture, 0.0);
        tile.add_nutrients(80.0);
        assert_eq!(tile.nutrients, 100.0);
        tile.consume_nutrients(101.0);
        assert_eq!(tile.nutrients, 0.0);
        tile.add_sunlight(31.0);
        assert_eq!(tile.sunlight, 100.0);
        tile.apply_shade(130.0);
        assert_eq!(tile.sunlight, 0.0);
    }

    #[test]
    fn test_color_bands() {
        let mut tile = tile();
        tile.moisture = 80.0;
        assert_eq!(tile.color(), COLOR_WET);
        tile.moisture = 50.0;
        assert_eq!(tile.color(), COLOR_MOIST);
        tile.moisture = 30.0;
        assert_eq!(tile.color(), COLOR_DRY);
        tile.moisture = 5.0;
        assert_eq!(tile.color(), COLOR_PARCHED);

        tile.place_entity(entity(ElementTypeId::Boulder)).unwrap();
        assert_eq!(tile.color(), "#78909C");
    }

    proptest! {
        #[test]
        fn prop_update_cycle_keeps_resources_bounded(
            moisture in -500.0f64..500.0,
            sunlight in -500.0f64..500.0,
            nutrients in -500.0f64..500.0,
        ) {
            let mut tile = tile();
            tile.moisture = moisture;
            tile.sunlight = sunlight;
            tile.nutrients = nutrients;
            tile.update_cycle(&TileConfig::default());
            prop_assert!((RESOURCE_MIN..=RESOURCE_MAX).contains(&tile.moisture));
            prop_assert!((RESOURCE_MIN..=RESOURCE_MAX).contains(&tile.sunlight));
            prop_assert!((RESOURCE_MIN..=RESOURCE_MAX).contains(&tile.nutrients));
        }
    }
}
