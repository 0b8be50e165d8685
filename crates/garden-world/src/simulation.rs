//! Simulation engine: cycle pipeline, placement and persistence.

use crate::entity::{CycleContext, Entity, UpdateOutcome};
use crate::environmental::apply_area_effect;
use crate::grid::{EntityHandle, Grid};
use crate::snapshot::SimulationSnapshot;
use crate::storage::{keys, KeyValueStore};
use chrono::{DateTime, TimeZone, Utc};
use garden_core::{
    Clock, ElementTypeId, Error, GardenConfig, Layer, ListenerId, PlacementError, Position,
    RejectReason, Result, Season,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, event, info, instrument, warn, Level};

/// Actor recorded on the demo layout
pub const SYSTEM_ACTOR: &str = "system";

/// Callback invoked after every cycle and every successful placement
pub type Listener = Box<dyn Fn(&SimulationEngine) + Send + Sync>;

/// Result of [`SimulationEngine::load_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing usable was stored; the world starts empty
    Fresh,
    Restored {
        missed_cycles: u64,
        replayed: u64,
    },
}

impl LoadOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, LoadOutcome::Restored { .. })
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub season: Season,
    pub updated: usize,
    pub died: usize,
    pub spawned: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GardenStats {
    pub total_elements: usize,
    pub living_plants: usize,
    pub avg_moisture: f64,
    pub ecosystem_health: u32,
    pub cycle_count: u64,
    pub season: Season,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub icon: String,
    pub age_days: u64,
    pub placed_by: String,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub name: String,
    pub icon: String,
    pub age_days: u64,
    pub is_alive: bool,
    pub health: u32,
    pub position: Option<Position>,
}

pub struct SimulationEngine {
    grid: Grid,
    config: GardenConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    cycle_count: u64,
    season: Season,
    started_at: DateTime<Utc>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl SimulationEngine {
    /// Empty world. Call [`load_state`](Self::load_state) to pick up a stored one.
    pub fn new(
        config: GardenConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let started_at = clock.now();

        Ok(Self {
            grid: Grid::new(&config.grid),
            config,
            store,
            clock,
            rng,
            cycle_count: 0,
            season: Season::Spring,
            started_at,
            listeners: Vec::new(),
            next_listener_id: 0,
        })
    }

    /// Replace the random source used for spreading
    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn config(&self) -> &GardenConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Season recorded by the most recent cycle
    pub fn season(&self) -> Season {
        self.season
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn season_at(&self, now: DateTime<Utc>) -> Season {
        let elapsed = (now - self.started_at)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        Season::at(elapsed, self.config.schedule.season_duration())
    }

    /// Advance the world by one cycle
    #[instrument(skip(self), fields(cycle = self.cycle_count + 1))]
    pub fn run_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let now = self.clock.now();
        self.season = self.season_at(now);

        let schedule = &self.config.schedule;
        let baseline = self.clock.time_of_day(schedule).base_sunlight(schedule);
        self.grid.reset_sunlight(baseline);

        self.grid.apply_shade_effects(self.config.effects.shade_amount);
        self.grid.apply_compost_effects();
        self.grid.update_cycle(&self.config.tile);

        let handles = self.grid.living_handles();
        let ctx = CycleContext {
            season: self.season,
            config: &self.config,
            timestamp_ms: now.timestamp_millis(),
        };

        let mut report = CycleReport {
            cycle: self.cycle_count,
            season: self.season,
            updated: 0,
            died: 0,
            spawned: 0,
            removed: 0,
            failed: 0,
        };

        for handle in handles {
            match update_entity(&mut self.grid, handle, &ctx, &mut self.rng) {
                Ok(outcome) => {
                    report.updated += 1;
                    if outcome.died {
                        report.died += 1;
                        debug!(
                            event = "entity_death",
                            id = %handle.id,
                            position = %handle.position,
                            layer = %handle.layer,
                            "Entity died"
                        );
                        event!(
                            Level::INFO,
                            counter_name = "entity_deaths",
                            counter_value = 1,
                            "Entity death metric"
                        );
                    }
                    if outcome.spawned.is_some() {
                        report.spawned += 1;
                        event!(
                            Level::INFO,
                            counter_name = "entity_spawns",
                            counter_value = 1,
                            "Entity spawn metric"
                        );
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        event = "entity_update_failed",
                        id = %handle.id,
                        position = %handle.position,
                        error = %e,
                        "Entity update failed; continuing cycle"
                    );
                }
            }
        }

        let removed = self
            .grid
            .sweep_dead(self.config.schedule.dead_grace_cycles);
        report.removed = removed.len();
        for entity in &removed {
            debug!(event = "corpse_removed", id = %entity.id, "Removed dead entity");
        }

        self.save_state();
        self.notify_listeners();

        let stats_interval = self.config.schedule.stats_log_interval;
        if stats_interval > 0 && self.cycle_count % stats_interval == 0 {
            self.log_metrics();
        }

        report
    }

    /// Run `count` cycles back to back
    pub fn run_cycles(&mut self, count: u64) -> Vec<CycleReport> {
        info!("Running {} cycle(s)", count);
        (0..count).map(|_| self.run_cycle()).collect()
    }

    /// Place a new element of `type_id` at (x, y) on behalf of `actor`.
    /// A dead occupant of the target layer is cleared away first.
    #[instrument(skip(self))]
    pub fn place_element(
        &mut self,
        type_id: ElementTypeId,
        x: i32,
        y: i32,
        actor: &str,
    ) -> std::result::Result<Entity, PlacementError> {
        let element_type = type_id.descriptor();
        let layer = element_type.layer();
        let pos = Position::new(x, y);
        let now_ms = self.clock.now().timestamp_millis();

        let tile = self
            .grid
            .tile_at_mut(pos)
            .ok_or(PlacementError::InvalidPosition { x, y })?;
        tile.can_place(element_type)
            .map_err(PlacementError::Rejected)?;

        if let Some(corpse) = tile.entity(layer).map(|entity| entity.id) {
            tile.remove_entity(Some(corpse));
            debug!(event = "corpse_replaced", id = %corpse, position = %pos, "Cleared dead occupant");
        }

        tile.place_entity(Entity::new(type_id, actor, now_ms))
            .map_err(|_| PlacementError::Rejected(RejectReason::LayerOccupied))?;

        if element_type.is_environmental() {
            apply_area_effect(&mut self.grid, element_type, pos);
            if let Some(entity) = self
                .grid
                .tile_at_mut(pos)
                .and_then(|tile| tile.entity_mut(layer))
            {
                entity.mark_activated();
            }
        }

        let placed = self
            .grid
            .tile_at(pos)
            .and_then(|tile| tile.entity(layer))
            .cloned()
            .ok_or(PlacementError::InvalidPosition { x, y })?;

        info!(
            event = "element_placed",
            id = %placed.id,
            element = %type_id,
            position = %pos,
            actor,
            "🌱 Element placed"
        );
        event!(
            Level::INFO,
            counter_name = "elements_placed",
            counter_value = 1,
            element = %type_id,
            "Placement metric"
        );

        self.save_state();
        self.notify_listeners();
        Ok(placed)
    }

    pub fn stats(&self) -> GardenStats {
        let living = self.grid.living_entities();
        GardenStats {
            total_elements: living.len(),
            living_plants: living.iter().filter(|entity| entity.is_plant()).count(),
            avg_moisture: self.grid.average_moisture(),
            ecosystem_health: self.grid.ecosystem_health(&self.config.health_score),
            cycle_count: self.cycle_count,
            season: self.season,
        }
    }

    /// Oldest living elements first
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut living = self.grid.living_entities();
        living.sort_by(|a, b| b.age.cmp(&a.age));
        living
            .into_iter()
            .take(limit)
            .map(|entity| LeaderboardEntry {
                name: entity.element_type().name.to_string(),
                icon: entity.icon().to_string(),
                age_days: entity.age_in_days(),
                placed_by: entity.placed_by.clone(),
                health: entity.health.round() as u32,
            })
            .collect()
    }

    /// Everything `actor` placed that is still on the grid, newest first
    pub fn contributions(&self, actor: &str) -> Vec<Contribution> {
        let mut mine: Vec<&Entity> = self
            .grid
            .entities()
            .filter(|entity| entity.placed_by == actor)
            .collect();
        mine.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        mine.into_iter()
            .map(|entity| Contribution {
                name: entity.element_type().name.to_string(),
                icon: entity.icon().to_string(),
                age_days: entity.age_in_days(),
                is_alive: entity.is_alive,
                health: entity.health.round() as u32,
                position: entity.position(),
            })
            .collect()
    }

    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&SimulationEngine) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify_listeners(&mut self) {
        let listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in &listeners {
            listener(&*self);
        }
        self.listeners = listeners;
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(event = "storage_read_failed", key, error = %e, "Failed to read stored value");
                None
            }
        }
    }

    fn write_key(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(event = "storage_write_failed", key, error = %e, "Failed to store value");
        }
    }

    fn restore_start_time(&mut self, now: DateTime<Utc>) {
        let stored = self
            .read_key(keys::START_TIME)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        match stored {
            Some(started_at) => self.started_at = started_at,
            None => {
                self.started_at = now;
                self.write_key(keys::START_TIME, &now.timestamp_millis().to_string());
            }
        }
        self.season = self.season_at(now);
    }

    /// Restore the stored world and replay the cycles missed since it was
    /// last saved. Unreadable state counts as no state.
    #[instrument(skip(self))]
    pub fn load_state(&mut self) -> LoadOutcome {
        let now = self.clock.now();
        self.restore_start_time(now);

        let Some(raw) = self.read_key(keys::GRID_STATE) else {
            info!("No stored garden, starting fresh");
            return LoadOutcome::Fresh;
        };

        let restored = SimulationSnapshot::from_json(&raw).and_then(|snapshot| {
            Grid::from_snapshot(&snapshot.grid, &self.config.grid).map(|grid| (snapshot, grid))
        });
        let (snapshot, grid) = match restored {
            Ok(restored) => restored,
            Err(e) => {
                warn!(event = "snapshot_corrupt", error = %e, "Stored garden is unreadable, starting fresh");
                return LoadOutcome::Fresh;
            }
        };

        self.grid = grid;
        self.cycle_count = snapshot.cycle_count;

        let last_run = self
            .read_key(keys::SIMULATION_LAST_RUN)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(snapshot.timestamp);
        let elapsed_ms = (now.timestamp_millis() - last_run).max(0) as u64;
        let missed_cycles = elapsed_ms / self.config.schedule.cycle_interval_ms.max(1);

        info!(
            event = "garden_restored",
            cycle_count = self.cycle_count,
            entities = self.grid.entities().count(),
            missed_cycles,
            "Restored stored garden"
        );

        if missed_cycles == 0 {
            return LoadOutcome::Restored {
                missed_cycles,
                replayed: 0,
            };
        }

        if missed_cycles >= self.config.schedule.catch_up_ceiling {
            warn!(
                event = "catch_up_skipped",
                missed_cycles,
                ceiling = self.config.schedule.catch_up_ceiling,
                "Too many missed cycles, skipping ahead without replay"
            );
            self.save_state();
            return LoadOutcome::Restored {
                missed_cycles,
                replayed: 0,
            };
        }

        info!("Replaying {} missed cycle(s)", missed_cycles);
        for _ in 0..missed_cycles {
            self.run_cycle();
        }

        LoadOutcome::Restored {
            missed_cycles,
            replayed: missed_cycles,
        }
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            grid: self.grid.to_snapshot(),
            cycle_count: self.cycle_count,
            timestamp: self.clock.now().timestamp_millis(),
        }
    }

    /// Write the snapshot and last-run time, surfacing failures
    pub fn try_save_state(&self) -> Result<()> {
        let snapshot = self.snapshot();
        self.store.set(keys::GRID_STATE, &snapshot.to_json()?)?;
        self.store
            .set(keys::SIMULATION_LAST_RUN, &snapshot.timestamp.to_string())?;
        Ok(())
    }

    /// Write the snapshot. On failure the in-memory world stays authoritative.
    pub fn save_state(&self) -> bool {
        match self.try_save_state() {
            Ok(()) => true,
            Err(e) => {
                warn!(event = "save_failed", error = %e, "Failed to persist garden; keeping in-memory state");
                false
            }
        }
    }

    /// Place the demo layout around the center. Returns how many landed.
    pub fn seed_garden(&mut self) -> usize {
        let c = (self.grid.size() / 2) as i32;
        let layout = [
            (ElementTypeId::OakTree, c, c),
            (ElementTypeId::GrassPatch, c - 2, c),
            (ElementTypeId::GrassPatch, c + 2, c),
            (ElementTypeId::GrassPatch, c, c - 2),
            (ElementTypeId::GrassPatch, c, c + 2),
            (ElementTypeId::Wildflower, c - 1, c - 1),
            (ElementTypeId::Wildflower, c + 1, c + 1),
            (ElementTypeId::RainCloud, c, c - 1),
        ];

        let mut placed = 0;
        for (type_id, x, y) in layout {
            match self.place_element(type_id, x, y, SYSTEM_ACTOR) {
                Ok(_) => placed += 1,
                Err(e) => debug!(element = %type_id, x, y, error = %e, "Seed placement skipped"),
            }
        }
        info!(event = "garden_seeded", placed, "🌱 Garden seeded");
        placed
    }

    /// Remove every entity, keeping tile resources
    pub fn clear_garden(&mut self) -> usize {
        let removed: usize = self
            .grid
            .iter_mut()
            .map(|tile| tile.remove_entity(None).len())
            .sum();
        info!(event = "garden_cleared", removed, "🧹 Garden cleared");
        self.save_state();
        removed
    }

    pub fn water_all(&mut self) {
        for tile in self.grid.iter_mut() {
            tile.add_moisture(100.0);
        }
        info!(event = "garden_watered", "💧 All tiles watered");
        self.save_state();
    }

    pub fn sunlight_boost_all(&mut self) {
        for tile in self.grid.iter_mut() {
            tile.add_sunlight(100.0);
        }
        info!(event = "garden_sunlit", "☀️ All tiles boosted to full sunlight");
        self.save_state();
    }

    /// Kill every living plant. Corpses stay for the grace window.
    pub fn kill_all_plants(&mut self) -> usize {
        let plants: Vec<EntityHandle> = self
            .grid
            .living_handles()
            .into_iter()
            .filter(|handle| handle.layer == Layer::Ground)
            .filter(|handle| {
                self.grid
                    .find_entity(handle.id)
                    .is_some_and(|entity| entity.is_plant())
            })
            .collect();

        let mut killed = 0;
        for handle in plants {
            if self
                .grid
                .kill_at(handle.position, handle.layer, &self.config.survival)
            {
                killed += 1;
            }
        }
        info!(event = "plants_killed", killed, "All plants killed");
        self.save_state();
        killed
    }

    pub fn kill_at(&mut self, x: i32, y: i32, layer: Layer) -> Result<bool> {
        let pos = Position::new(x, y);
        if !self.grid.contains(pos) {
            return Err(Error::InvalidPosition { x, y });
        }
        let killed = self.grid.kill_at(pos, layer, &self.config.survival);
        if killed {
            self.save_state();
        }
        Ok(killed)
    }

    /// Forget every stored key and start an empty world now
    pub fn reset(&mut self) -> Result<()> {
        for key in keys::ALL {
            self.store.remove(key)?;
        }

        let now = self.clock.now();
        self.grid = Grid::new(&self.config.grid);
        self.cycle_count = 0;
        self.started_at = now;
        self.season = Season::Spring;
        self.store
            .set(keys::START_TIME, &now.timestamp_millis().to_string())?;

        info!(event = "garden_reset", "Garden reset");
        Ok(())
    }

    fn log_metrics(&self) {
        let stats = self.stats();
        info!(
            event = "garden_metrics",
            cycle = stats.cycle_count,
            season = %stats.season,
            total_elements = stats.total_elements,
            living_plants = stats.living_plants,
            avg_moisture = format!("{:.1}", stats.avg_moisture),
            ecosystem_health = stats.ecosystem_health,
            dead_entities = self.grid.dead_entities().len(),
            "Garden metrics snapshot"
        );

        event!(
            Level::INFO,
            gauge_name = "living_elements",
            gauge_value = stats.total_elements,
            cycle = stats.cycle_count,
            "Living elements gauge"
        );

        event!(
            Level::INFO,
            gauge_name = "ecosystem_health",
            gauge_value = stats.ecosystem_health,
            cycle = stats.cycle_count,
            "Ecosystem health gauge"
        );
    }
}

/// Detach the entity behind `handle`, update it against the grid and put it
/// back. Entities removed or replaced earlier in the pass are skipped.
fn update_entity<R: Rng + ?Sized>(
    grid: &mut Grid,
    handle: EntityHandle,
    ctx: &CycleContext<'_>,
    rng: &mut R,
) -> Result<UpdateOutcome> {
    let tile = grid
        .tile_at_mut(handle.position)
        .ok_or_else(|| Error::NotFound(format!("tile {}", handle.position)))?;
    let Some(mut entity) = tile.detach(handle.layer) else {
        return Ok(UpdateOutcome::default());
    };

    if entity.id != handle.id || !entity.is_alive {
        tile.reattach(entity).map_err(|entity| {
            Error::InvalidState(format!("could not restore entity {}", entity.id))
        })?;
        return Ok(UpdateOutcome::default());
    }

    let outcome = entity.update(grid, ctx, rng);

    let tile = grid
        .tile_at_mut(handle.position)
        .ok_or_else(|| Error::NotFound(format!("tile {}", handle.position)))?;
    tile.reattach(entity).map_err(|entity| {
        Error::InvalidState(format!(
            "slot at {} was refilled while entity {} updated",
            handle.position, entity.id
        ))
    })?;

    Ok(outcome)
}
