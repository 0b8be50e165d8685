//! Environmental elements: expiry and area effects.

use crate::entity::{CycleContext, Entity, EntityState, UpdateOutcome};
use crate::grid::Grid;
use garden_core::{ElementType, Position};

impl Entity {
    pub(crate) fn update_environmental(
        &mut self,
        grid: &mut Grid,
        ctx: &CycleContext<'_>,
    ) -> UpdateOutcome {
        let element_type = self.element_type();
        if element_type.permanent {
            return UpdateOutcome::default();
        }

        if element_type.duration.is_some_and(|duration| self.age >= duration) {
            self.die_in(grid, &ctx.config.survival);
            return UpdateOutcome::died();
        }

        self.apply_effects(grid);
        UpdateOutcome::default()
    }

    /// Apply this element's area effect around its tile. Also run once on
    /// placement so the effect is visible before the next cycle.
    pub fn apply_effects(&mut self, grid: &mut Grid) {
        let Some(center) = self.position() else {
            return;
        };
        apply_area_effect(grid, self.element_type(), center);
        self.mark_activated();
    }

    pub(crate) fn mark_activated(&mut self) {
        if let EntityState::Environmental(state) = &mut self.state {
            state.has_activated = true;
        }
    }

    /// Cycles left before expiry; `None` for permanent elements
    pub fn remaining_cycles(&self) -> Option<u64> {
        let element_type = self.element_type();
        if element_type.permanent {
            return None;
        }
        element_type
            .duration
            .map(|duration| duration.saturating_sub(self.age))
    }

    pub(crate) fn describe_environmental(&self) -> String {
        let element_type = self.element_type();
        if !self.is_alive {
            return format!("{} - Expired", element_type.name);
        }

        let lifetime = match self.remaining_cycles() {
            Some(remaining) => format!("Remaining: {} cycles", remaining),
            None => "Permanent structure".to_string(),
        };
        format!(
            "{}\n{}\n{}",
            element_type.name, lifetime, element_type.description
        )
    }
}

/// Moisture and sunlight boosts in a square radius around `center`. The
/// center receives the full moisture boost, the rest half of it.
pub fn apply_area_effect(grid: &mut Grid, element_type: &ElementType, center: Position) {
    let moisture = element_type.moisture_boost;
    let sunlight = element_type.sunlight_boost;
    if moisture <= 0.0 && sunlight <= 0.0 {
        return;
    }

    for pos in grid.positions_in_radius(center, element_type.effect_radius) {
        let Some(tile) = grid.tile_at_mut(pos) else {
            continue;
        };
        if moisture > 0.0 {
            let boost = if pos == center { moisture } else { moisture / 2.0 };
            tile.add_moisture(boost);
        }
        if sunlight > 0.0 {
            tile.add_sunlight(sunlight);
        }
    }
}
