//! One-shot maintenance commands against a stored garden.

use crate::Command;
use anyhow::{bail, Result};
use garden_core::{Clock, Layer, Position};
use garden_world::{PlacementLedger, SimulationEngine, TileRecord};
use serde::Serialize;

pub fn execute(engine: &mut SimulationEngine, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Run { .. } => bail!("run is handled by the async entry point"),
        Command::Place {
            element,
            x,
            y,
            actor,
            ignore_cooldown,
        } => {
            let ledger = PlacementLedger::new(engine.store(), engine.config().placement.clone());
            let now = engine.clock().now();
            if !ignore_cooldown {
                ledger.check(&actor, now)?;
            }

            let entity = engine.place_element(element, x, y, &actor)?;
            ledger.record_placement(&actor, now)?;
            crate::record_counter!("placements", 1u64);

            if json {
                print_json(&garden_world::EntityRecord::from(&entity))?;
            } else {
                println!(
                    "{} {} placed at ({}, {}) by {}",
                    entity.icon(),
                    entity.element_type().name,
                    x,
                    y,
                    actor
                );
            }
        }
        Command::Stats => {
            let stats = engine.stats();
            if json {
                print_json(&stats)?;
            } else {
                println!("Cycle:            {}", stats.cycle_count);
                println!("Season:           {}", stats.season);
                println!("Elements:         {}", stats.total_elements);
                println!("Living plants:    {}", stats.living_plants);
                println!("Average moisture: {:.1}", stats.avg_moisture);
                println!("Ecosystem health: {}", stats.ecosystem_health);
            }
        }
        Command::Leaderboard { limit } => {
            let entries = engine.leaderboard(limit);
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("Nothing is growing yet");
            } else {
                for (rank, entry) in entries.iter().enumerate() {
                    println!(
                        "{:>2}. {} {} - {} days (health {}, placed by {})",
                        rank + 1,
                        entry.icon,
                        entry.name,
                        entry.age_days,
                        entry.health,
                        entry.placed_by
                    );
                }
            }
        }
        Command::Contributions { actor } => {
            let contributions = engine.contributions(&actor);
            if json {
                print_json(&contributions)?;
            } else if contributions.is_empty() {
                println!("{actor} has not placed anything that is still in the garden");
            } else {
                for item in &contributions {
                    let status = if item.is_alive { "alive" } else { "dead" };
                    let at = item
                        .position
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {} at {} - {} days, {}",
                        item.icon, item.name, at, item.age_days, status
                    );
                }
            }
        }
        Command::Inspect { x, y } => inspect(engine, x, y, json)?,
        Command::Cycles { count } => {
            let reports = engine.run_cycles(count);
            let died: usize = reports.iter().map(|r| r.died).sum();
            let spawned: usize = reports.iter().map(|r| r.spawned).sum();
            if json {
                print_json(&CyclesSummary {
                    cycles: reports.len(),
                    died,
                    spawned,
                    cycle_count: engine.cycle_count(),
                })?;
            } else {
                println!(
                    "Ran {} cycles ({} died, {} spawned); now at cycle {}",
                    reports.len(),
                    died,
                    spawned,
                    engine.cycle_count()
                );
            }
        }
        Command::Seed => {
            let placed = engine.seed_garden();
            println!("Seeded {placed} elements");
        }
        Command::Clear => {
            let removed = engine.clear_garden();
            println!("Removed {removed} elements");
        }
        Command::WaterAll => {
            engine.water_all();
            println!("Watered every tile");
        }
        Command::SunlightAll => {
            engine.sunlight_boost_all();
            println!("Boosted sunlight on every tile");
        }
        Command::KillPlants => {
            let killed = engine.kill_all_plants();
            println!("Killed {killed} plants");
        }
        Command::Kill { x, y, atmospheric } => {
            let layer = if atmospheric {
                Layer::Atmospheric
            } else {
                Layer::Ground
            };
            if engine.kill_at(x, y, layer)? {
                println!("Killed the {layer} occupant at ({x}, {y})");
            } else {
                println!("Nothing alive on the {layer} layer at ({x}, {y})");
            }
        }
        Command::ResetCooldown { actor } => {
            let ledger = PlacementLedger::new(engine.store(), engine.config().placement.clone());
            ledger.reset(actor.as_deref())?;
            match actor {
                Some(actor) => println!("Cooldown cleared for {actor}"),
                None => println!("Cooldowns cleared"),
            }
        }
        Command::Reset => {
            engine.reset()?;
            println!("Garden reset");
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CyclesSummary {
    cycles: usize,
    died: usize,
    spawned: usize,
    cycle_count: u64,
}

fn inspect(engine: &SimulationEngine, x: i32, y: i32, json: bool) -> Result<()> {
    let grid = engine.grid();
    let Some(tile) = grid.tile_at(Position::new(x, y)) else {
        bail!("({x}, {y}) is outside the garden");
    };

    if json {
        return print_json(&TileRecord::from(tile));
    }

    println!("Tile ({x}, {y}) [{}]", tile.color());
    println!("  moisture    {:.1}", tile.moisture);
    println!("  sunlight    {:.1}", tile.sunlight);
    println!("  nutrients   {:.1}", tile.nutrients);
    println!("  temperature {:.1}", tile.temperature);

    let mut empty = true;
    for entity in tile.entities() {
        empty = false;
        println!(
            "  {} [{}] {} (placed by {})",
            entity.icon(),
            entity.color(),
            entity.describe(grid),
            entity.placed_by
        );
    }
    if empty {
        println!("  empty");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
