//! Plant behavior: survival, growth stages, consumption and spreading.

use crate::entity::{CycleContext, Entity, EntityState, UpdateOutcome};
use crate::grid::Grid;
use crate::tile::RESOURCE_MAX;
use garden_core::{ElementTypeId, EntityId, Position, Season, SurvivalConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Actor recorded on entities created by spreading
pub const SPREAD_ACTOR: &str = "spread";

const WILTED_ICON: &str = "🍂";
const SEEDLING_ICON: &str = "🌱";
const SICKLY_COLOR: &str = "#A1887F";

impl Entity {
    pub(crate) fn update_plant<R: Rng + ?Sized>(
        &mut self,
        grid: &mut Grid,
        ctx: &CycleContext<'_>,
        rng: &mut R,
    ) -> UpdateOutcome {
        let Some(pos) = self.position() else {
            return UpdateOutcome::default();
        };
        let element_type = self.element_type();
        let survival = &ctx.config.survival;

        if element_type.max_age.is_some_and(|max_age| self.age >= max_age) {
            self.die_in(grid, survival);
            return UpdateOutcome::died();
        }

        let Some(tile) = grid.tile_at(pos) else {
            return UpdateOutcome::default();
        };
        let moisture = tile.moisture;
        let sunlight = tile.sunlight;
        let growth_bonus = tile.effects.growth_bonus;

        if !self.check_survival(moisture, sunlight, survival) {
            self.die_in(grid, survival);
            return UpdateOutcome::died();
        }

        self.grow(moisture, sunlight, growth_bonus, ctx.season);

        if let Some(tile) = grid.tile_at_mut(pos) {
            tile.consume_moisture(survival.moisture_draw);
            tile.consume_nutrients(survival.nutrient_draw);
        }

        let spawned = if element_type.spreads {
            self.try_spread(grid, pos, ctx, rng)
        } else {
            None
        };

        UpdateOutcome {
            died: false,
            spawned,
        }
    }

    /// Apply water and light penalties. Returns whether the plant survives.
    fn check_survival(&mut self, moisture: f64, sunlight: f64, survival: &SurvivalConfig) -> bool {
        if self.health <= 0.0 {
            return false;
        }

        let element_type = self.type_id.descriptor();
        if let EntityState::Plant(state) = &mut self.state {
            if moisture < survival.min_moisture_to_survive {
                state.cycles_without_water += 1;
                if state.cycles_without_water >= survival.wilting_cycles {
                    self.health -= survival.wilting_damage;
                }
            } else {
                state.cycles_without_water = 0;
                self.health = (self.health + survival.recovery_per_cycle).min(RESOURCE_MAX);
            }
        }

        if element_type.needs_sunlight && sunlight < element_type.min_sunlight {
            self.health -= survival.sunlight_damage;
        }

        self.health = self.health.max(0.0);
        self.health > 0.0
    }

    fn grow(&mut self, moisture: f64, sunlight: f64, growth_bonus: f64, season: Season) {
        let element_type = self.type_id.descriptor();

        let mut rate = moisture / RESOURCE_MAX;
        if element_type.needs_sunlight {
            rate *= sunlight / RESOURCE_MAX;
        }
        rate *= season.growth_modifier() * growth_bonus;
        self.growth_progress += rate;

        let Some(growth_time) = element_type.growth_time else {
            return;
        };
        let stages = element_type.growth_stages;
        if stages == 0 {
            return;
        }

        let cycles_per_stage = growth_time as f64 / stages as f64;
        let target = ((self.growth_progress / cycles_per_stage).floor() as u32).min(stages);
        if target <= self.current_stage {
            return;
        }
        self.current_stage = target;

        if target == stages && element_type.attracts_pollinators {
            if let EntityState::Plant(state) = &mut self.state {
                state.has_flowered = true;
            }
        }
    }

    fn try_spread<R: Rng + ?Sized>(
        &self,
        grid: &mut Grid,
        pos: Position,
        ctx: &CycleContext<'_>,
        rng: &mut R,
    ) -> Option<EntityId> {
        let survival = &ctx.config.survival;
        if self.age < survival.spread_min_age {
            return None;
        }
        if !rng.gen_bool(survival.spread_chance.clamp(0.0, 1.0)) {
            return None;
        }

        let candidates: Vec<Position> = grid
            .adjacent_tiles(pos)
            .into_iter()
            .filter(|tile| !tile.is_occupied() && tile.moisture >= survival.min_moisture_to_survive)
            .map(|tile| tile.position())
            .collect();
        let target = *candidates.choose(rng)?;

        let offspring = Entity::new(self.type_id, SPREAD_ACTOR, ctx.timestamp_ms);
        let id = offspring.id;
        grid.tile_at_mut(target)?.place_entity(offspring).ok()?;

        debug!(
            event = "plant_spread",
            parent = %self.id,
            child = %id,
            from = %pos,
            to = %target,
            "Plant spread to neighbor"
        );
        Some(id)
    }

    pub(crate) fn describe_plant(&self, grid: &Grid) -> String {
        let element_type = self.element_type();
        if !self.is_alive {
            return format!("{} - Dead after {} days", element_type.name, self.age_in_days());
        }

        let mut text = format!(
            "{}\nAge: {} days\nHealth: {:.0}%\nGrowth: Stage {}/{}\n",
            element_type.name,
            self.age_in_days(),
            self.health,
            self.current_stage,
            element_type.growth_stages
        );

        if self
            .plant_state()
            .is_some_and(|state| state.cycles_without_water > 0)
        {
            text.push_str("⚠️ Needs water!\n");
        }

        if let Some(tile) = self.position().and_then(|pos| grid.tile_at(pos)) {
            text.push_str(&format!(
                "Moisture: {:.0}%\nSunlight: {:.0}%",
                tile.moisture, tile.sunlight
            ));
        }

        text
    }

    pub(crate) fn plant_icon(&self) -> &'static str {
        if !self.is_alive {
            return WILTED_ICON;
        }
        match self.type_id {
            ElementTypeId::OakTree | ElementTypeId::Wildflower if self.current_stage == 0 => {
                SEEDLING_ICON
            }
            _ => self.element_type().icon,
        }
    }

    pub(crate) fn plant_color(&self) -> &'static str {
        if self.health < 50.0 {
            SICKLY_COLOR
        } else {
            self.element_type().color
        }
    }
}
