//! Wall-clock scheduling of simulation cycles.

use crate::simulation::SimulationEngine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives an engine on a fixed interval. Cycles never overlap: each tick takes
/// the engine lock and late ticks are skipped.
pub struct SimulationRunner {
    engine: Arc<Mutex<SimulationEngine>>,
    base_interval: Duration,
    speed: u32,
    running: Option<RunningLoop>,
}

impl SimulationRunner {
    pub fn new(engine: Arc<Mutex<SimulationEngine>>) -> Self {
        let base_interval = engine.lock().config().schedule.cycle_interval();
        Self {
            engine,
            base_interval,
            speed: 1,
            running: None,
        }
    }

    pub fn engine(&self) -> Arc<Mutex<SimulationEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Interval between cycles at the current speed
    pub fn effective_interval(&self) -> Duration {
        self.base_interval / self.speed.max(1)
    }

    /// Run one cycle now, then one per interval. Returns `false` if already
    /// running. Must be called within a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let engine = Arc::clone(&self.engine);
        let period = self.effective_interval();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    // The first tick completes immediately
                    _ = ticker.tick() => {
                        let report = engine.lock().run_cycle();
                        debug!(
                            cycle = report.cycle,
                            died = report.died,
                            spawned = report.spawned,
                            removed = report.removed,
                            "Cycle complete"
                        );
                    }
                }
            }
        });

        info!(interval = ?period, speed = self.speed, "Simulation started");
        self.running = Some(RunningLoop { token, handle });
        true
    }

    /// Stop scheduling further cycles. A cycle in progress completes.
    /// Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };
        running.token.cancel();
        info!("Simulation stopped");
        true
    }

    /// Stop and wait for the loop task to finish
    pub async fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            let _ = running.handle.await;
            info!("Simulation shut down");
        }
    }

    /// Change the speed multiplier and (re)start the loop at the new
    /// interval. 0 pauses.
    pub fn set_speed(&mut self, multiplier: u32) {
        self.stop();
        self.speed = multiplier;

        if multiplier == 0 {
            info!("Simulation paused");
            return;
        }
        self.start();
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
        }
    }
}
