use chrono::{DateTime, TimeZone, Utc};
use garden_core::{
    Clock, ElementTypeId, Error, GardenConfig, GridConfig, ManualClock, Result,
};
use garden_world::{keys, FileStore, KeyValueStore, LoadOutcome, MemoryStore, SimulationEngine};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn config(size: usize) -> GardenConfig {
    GardenConfig {
        grid: GridConfig {
            size,
            ..GridConfig::default()
        },
        ..GardenConfig::default()
    }
}

fn engine_with(
    config: GardenConfig,
    store: Arc<dyn KeyValueStore>,
    clock: &ManualClock,
) -> SimulationEngine {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    SimulationEngine::new(config, store, clock).unwrap()
}

struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Persistence("disk full".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_rain_cloud_wets_area_on_placement() {
    let clock = ManualClock::new(noon());
    let mut engine = engine_with(config(10), Arc::new(MemoryStore::new()), &clock);

    for tile in engine.grid_mut().iter_mut() {
        tile.moisture = 10.0;
    }
    engine.grid_mut().tile_mut(5, 5).unwrap().moisture = 0.0;

    engine
        .place_element(ElementTypeId::RainCloud, 5, 5, "alice")
        .unwrap();

    let grid = engine.grid();
    assert_eq!(grid.tile(5, 5).unwrap().moisture, 80.0);
    for (x, y) in [(4, 4), (5, 4), (6, 4), (4, 5), (6, 5), (4, 6), (5, 6), (6, 6)] {
        assert_eq!(grid.tile(x, y).unwrap().moisture, 50.0, "tile ({x}, {y})");
    }
    assert_eq!(grid.tile(7, 7).unwrap().moisture, 10.0);
}

#[test]
fn test_health_rises_with_watered_plants() {
    let clock = ManualClock::new(noon());
    let mut engine = engine_with(config(10), Arc::new(MemoryStore::new()), &clock);
    let empty_health = engine.stats().ecosystem_health;

    let mut placed = 0;
    for y in 0..10 {
        for x in 0..10 {
            if placed == 20 || (x + y) % 2 == 1 {
                continue;
            }
            engine
                .place_element(ElementTypeId::GrassPatch, x, y, "alice")
                .unwrap();
            placed += 1;
        }
    }
    engine.water_all();

    let stats = engine.stats();
    assert_eq!(stats.total_elements, 20);
    assert!(stats.ecosystem_health > empty_health);
    assert!(stats.ecosystem_health <= 100);
}

#[test]
fn test_state_survives_reload() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();

    let mut first = engine_with(config(12), Arc::new(store.clone()), &clock);
    first.load_state();
    first
        .place_element(ElementTypeId::OakTree, 3, 4, "alice")
        .unwrap();
    first.run_cycles(2);
    let tree = first.grid().tile(3, 4).unwrap().ground_entity().cloned().unwrap();

    let mut second = engine_with(config(12), Arc::new(store), &clock);
    let outcome = second.load_state();

    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            missed_cycles: 0,
            replayed: 0
        }
    );
    assert_eq!(second.cycle_count(), 2);
    assert_eq!(second.started_at(), first.started_at());

    let restored = second.grid().tile(3, 4).unwrap().ground_entity().unwrap();
    assert_eq!(restored.id, tree.id);
    assert_eq!(restored.age, tree.age);
    assert_eq!(restored.health, tree.health);
    assert_eq!(restored.placed_by, "alice");
}

#[test]
fn test_missed_cycles_are_replayed() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();
    let cfg = config(8);
    let interval = cfg.schedule.cycle_interval();

    let mut first = engine_with(cfg.clone(), Arc::new(store.clone()), &clock);
    first.load_state();
    first
        .place_element(ElementTypeId::GrassPatch, 2, 2, "alice")
        .unwrap();

    clock.advance(interval * 3 + Duration::from_secs(10));

    let mut second = engine_with(cfg, Arc::new(store), &clock);
    let outcome = second.load_state();

    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            missed_cycles: 3,
            replayed: 3
        }
    );
    assert_eq!(second.cycle_count(), 3);
    let grass = second.grid().tile(2, 2).unwrap().ground_entity().unwrap();
    assert_eq!(grass.age, 3);
}

#[test]
fn test_long_absence_skips_replay() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();
    let cfg = config(8);
    let interval = cfg.schedule.cycle_interval();
    let ceiling = cfg.schedule.catch_up_ceiling;

    let mut first = engine_with(cfg.clone(), Arc::new(store.clone()), &clock);
    first.load_state();
    first
        .place_element(ElementTypeId::Boulder, 1, 1, "alice")
        .unwrap();

    clock.advance(interval * (ceiling as u32 + 5));

    let mut second = engine_with(cfg.clone(), Arc::new(store.clone()), &clock);
    let outcome = second.load_state();
    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            missed_cycles: ceiling + 5,
            replayed: 0
        }
    );
    assert_eq!(second.cycle_count(), 0);
    assert!(second.grid().tile(1, 1).unwrap().ground_entity().is_some());

    // The skip is recorded, so an immediate reload has nothing to catch up
    let mut third = engine_with(cfg, Arc::new(store), &clock);
    assert_eq!(
        third.load_state(),
        LoadOutcome::Restored {
            missed_cycles: 0,
            replayed: 0
        }
    );
}

#[test]
fn test_corrupt_state_starts_fresh() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();
    store.set(keys::GRID_STATE, "{ not a garden").unwrap();

    let mut engine = engine_with(config(8), Arc::new(store), &clock);

    assert_eq!(engine.load_state(), LoadOutcome::Fresh);
    assert_eq!(engine.grid().entities().count(), 0);
    assert_eq!(engine.cycle_count(), 0);
}

#[test]
fn test_implausible_grid_size_starts_fresh() {
    let clock = ManualClock::new(noon());

    for size in ["4294967296", "0", "9"] {
        let store = MemoryStore::new();
        let raw = format!(
            r#"{{"grid":{{"size":{size},"tiles":[]}},"cycleCount":12,"timestamp":{}}}"#,
            noon().timestamp_millis()
        );
        store.set(keys::GRID_STATE, &raw).unwrap();

        let mut engine = engine_with(config(8), Arc::new(store), &clock);
        assert_eq!(engine.load_state(), LoadOutcome::Fresh, "size {size}");
        assert_eq!(engine.grid().size(), 8);
        assert_eq!(engine.cycle_count(), 0);
    }
}

#[test]
fn test_reload_clamps_tile_resources() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();
    let raw = format!(
        r#"{{"grid":{{"size":4,"tiles":[{{"x":1,"y":2,"moisture":500,"sunlight":-40,"nutrients":250,"temperature":20}}]}},"cycleCount":3,"timestamp":{}}}"#,
        noon().timestamp_millis()
    );
    store.set(keys::GRID_STATE, &raw).unwrap();

    let mut engine = engine_with(config(4), Arc::new(store), &clock);
    assert!(engine.load_state().is_restored());

    let tile = engine.grid().tile(1, 2).unwrap();
    assert_eq!(tile.moisture, 100.0);
    assert_eq!(tile.sunlight, 0.0);
    assert_eq!(tile.nutrients, 100.0);
    assert!(engine.stats().avg_moisture <= 100.0);
}

#[test]
fn test_failing_store_keeps_world_running() {
    let clock = ManualClock::new(noon());
    let mut engine = engine_with(config(8), Arc::new(FailingStore), &clock);

    assert_eq!(engine.load_state(), LoadOutcome::Fresh);
    engine
        .place_element(ElementTypeId::Wildflower, 4, 4, "alice")
        .unwrap();

    let report = engine.run_cycle();
    assert_eq!(report.cycle, 1);
    assert_eq!(report.failed, 0);
    assert!(!engine.save_state());
    assert!(engine.try_save_state().is_err());
    assert_eq!(engine.grid().tile(4, 4).unwrap().ground_entity().unwrap().age, 1);
}

#[test]
fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(noon());

    let mut first = engine_with(config(10), Arc::new(FileStore::new(dir.path())), &clock);
    first.load_state();
    assert_eq!(first.seed_garden(), 8);
    let living = first.stats().total_elements;

    let mut second = engine_with(config(10), Arc::new(FileStore::new(dir.path())), &clock);
    assert!(second.load_state().is_restored());
    assert_eq!(second.stats().total_elements, living);
    assert!(dir.path().join(format!("{}.json", keys::GRID_STATE)).exists());
}

#[test]
fn test_second_writer_is_refused_while_garden_is_locked() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(noon());

    let running_store = FileStore::new(dir.path());
    let running_lock = running_store.lock().unwrap();
    let mut running = engine_with(config(10), Arc::new(running_store), &clock);
    running.load_state();

    // A one-shot command cannot open the garden while the loop holds it
    let command_store = FileStore::new(dir.path());
    assert!(matches!(command_store.lock(), Err(Error::InvalidState(_))));

    running.run_cycle();
    drop(running_lock);

    let _command_lock = command_store.lock().unwrap();
    let mut command = engine_with(config(10), Arc::new(command_store), &clock);
    assert!(command.load_state().is_restored());
    command
        .place_element(ElementTypeId::Boulder, 2, 3, "alice")
        .unwrap();

    let mut reader = engine_with(config(10), Arc::new(FileStore::new(dir.path())), &clock);
    reader.load_state();
    assert_eq!(reader.cycle_count(), 1);
    assert!(reader.grid().tile(2, 3).unwrap().ground_entity().is_some());
}

#[test]
fn test_reset_forgets_stored_garden() {
    let clock = ManualClock::new(noon());
    let store = MemoryStore::new();

    let mut first = engine_with(config(10), Arc::new(store.clone()), &clock);
    first.seed_garden();
    first.run_cycle();
    first.reset().unwrap();
    assert_eq!(first.grid().entities().count(), 0);
    assert_eq!(first.cycle_count(), 0);

    let mut second = engine_with(config(10), Arc::new(store), &clock);
    assert_eq!(second.load_state(), LoadOutcome::Fresh);
}

fn element_strategy() -> impl Strategy<Value = ElementTypeId> {
    prop::sample::select(ElementTypeId::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_health_stays_in_range(
        placements in prop::collection::vec((element_strategy(), 0i32..6, 0i32..6), 0..30),
        cycles in 0u64..4,
    ) {
        let clock = ManualClock::new(noon());
        let mut engine = engine_with(config(6), Arc::new(MemoryStore::new()), &clock);

        for (element, x, y) in placements {
            let _ = engine.place_element(element, x, y, "prop");
        }
        engine.run_cycles(cycles);

        let stats = engine.stats();
        prop_assert!(stats.ecosystem_health <= 100);
        prop_assert!((0.0..=100.0).contains(&stats.avg_moisture));
        for entity in engine.grid().entities() {
            prop_assert!((0.0..=100.0).contains(&entity.health));
        }
    }
}
